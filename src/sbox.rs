//! The 4-bit S-box and its difference distribution tables.

use std::str::FromStr;

use crate::errors::Error;

/// A 4-bit S-box together with its inverse and both difference
/// distribution tables, all derived once at construction.
///
/// The DDT is the only view of the S-box the trail search consults;
/// `ddt[dx][dy]` counts the inputs `x` with `S[x] ^ S[x ^ dx] == dy`.
#[derive(Clone, Debug)]
pub struct Sbox {
    table: [u16; 16],
    inverse: [u16; 16],
    ddt: Vec<Vec<u16>>,
    ddt_transposed: Vec<Vec<u16>>,
}

impl Sbox {
    /// Creates a new S-box from its table. The caller is responsible for
    /// passing a permutation of 0..=15; this is not checked.
    pub fn new(table: [u16; 16]) -> Sbox {
        let mut inverse = [0u16; 16];
        for (x, &y) in table.iter().enumerate() {
            inverse[y as usize] = x as u16;
        }

        let mut ddt = vec![vec![0u16; 16]; 16];
        let mut ddt_transposed = vec![vec![0u16; 16]; 16];

        for x in 0..16usize {
            let y = table[x];

            for dx in 0..16usize {
                let dy = (y ^ table[x ^ dx]) as usize;
                ddt[dx][dy] += 1;
                ddt_transposed[dy][dx] += 1;
            }
        }

        Sbox {
            table,
            inverse,
            ddt,
            ddt_transposed,
        }
    }

    /// Applies the S-box to the low nibble of the input.
    #[inline(always)]
    pub fn apply(&self, x: u16) -> u16 {
        self.table[(x & 0xf) as usize]
    }

    /// Applies the inverse S-box to the low nibble of the input.
    #[inline(always)]
    pub fn apply_inv(&self, x: u16) -> u16 {
        self.inverse[(x & 0xf) as usize]
    }

    /// Returns the difference distribution table.
    pub fn ddt(&self) -> &[Vec<u16>] {
        &self.ddt
    }

    /// Returns the transposed table, `ddt_transposed[dy][dx] == ddt[dx][dy]`.
    pub fn ddt_transposed(&self) -> &[Vec<u16>] {
        &self.ddt_transposed
    }
}

impl FromStr for Sbox {
    type Err = Error;

    /// Parses the command line form: sixteen space separated decimal values
    /// in 0..=15, e.g. `"6 10 11 15 12 2 13 5 3 8 0 1 14 7 4 9"`.
    fn from_str(s: &str) -> Result<Sbox, Error> {
        let mut table = [0u16; 16];
        let mut len = 0;

        for token in s.split_whitespace() {
            if len == 16 {
                return Err(Error::BadSbox(String::from("more than sixteen entries")));
            }

            let value: u16 = token
                .parse()
                .map_err(|_| Error::BadSbox(format!("cannot parse entry '{}'", token)))?;

            if value > 0xf {
                return Err(Error::BadSbox(format!("entry {} out of range", value)));
            }

            table[len] = value;
            len += 1;
        }

        if len != 16 {
            return Err(Error::BadSbox(format!("expected sixteen entries, got {}", len)));
        }

        Ok(Sbox::new(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "6 10 11 15 12 2 13 5 3 8 0 1 14 7 4 9";

    fn reference() -> Sbox {
        REFERENCE.parse().expect("reference S-box parses")
    }

    #[test]
    fn inverse_round_trips() {
        let sbox = reference();

        for n in 0..16 {
            assert_eq!(sbox.apply_inv(sbox.apply(n)), n);
            assert_eq!(sbox.apply(sbox.apply_inv(n)), n);
        }
    }

    #[test]
    fn ddt_matches_definition() {
        let sbox = reference();

        for dx in 0..16u16 {
            for dy in 0..16u16 {
                let count = (0..16u16)
                    .filter(|&x| sbox.apply(x) ^ sbox.apply(x ^ dx) == dy)
                    .count() as u16;
                assert_eq!(sbox.ddt()[dx as usize][dy as usize], count);
            }
        }
    }

    #[test]
    fn ddt_rows_sum_to_sixteen() {
        let sbox = reference();

        for row in sbox.ddt() {
            assert_eq!(row.iter().sum::<u16>(), 16);
        }
    }

    #[test]
    fn ddt_trivial_row() {
        let sbox = reference();

        assert_eq!(sbox.ddt()[0][0], 16);
        for dy in 1..16 {
            assert_eq!(sbox.ddt()[0][dy], 0);
        }
    }

    #[test]
    fn transpose_identity() {
        let sbox = reference();

        for dx in 0..16 {
            for dy in 0..16 {
                assert_eq!(sbox.ddt_transposed()[dy][dx], sbox.ddt()[dx][dy]);
            }
        }
    }

    #[test]
    fn parsing_rejects_bad_input() {
        assert!("1 2 3".parse::<Sbox>().is_err());
        assert!("6 10 11 15 12 2 13 5 3 8 0 1 14 7 4 16".parse::<Sbox>().is_err());
        assert!("6 10 11 15 12 2 13 5 3 8 0 1 14 7 4 x".parse::<Sbox>().is_err());
        assert!("6 10 11 15 12 2 13 5 3 8 0 1 14 7 4 9 0".parse::<Sbox>().is_err());
        assert!(REFERENCE.parse::<Sbox>().is_ok());
    }
}
