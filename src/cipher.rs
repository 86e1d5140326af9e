//! The SPN under attack, behind the capability set the recovery needs.

use crate::errors::Error;
use crate::sbox::Sbox;

/// Number of full rounds.
pub const ROUNDS: usize = 4;

/// Number of round subkeys, one per key-addition layer.
pub const SUBKEYS: usize = ROUNDS + 1;

/// The operations the attack performs with the cipher. Keeping the surface
/// this narrow lets the recovery run against a stub in tests.
pub trait Cipher: Sync {
    /// Returns the S-box, the source of the difference distribution tables.
    fn sbox(&self) -> &Sbox;

    /// Applies the S-box to all four nibbles in parallel.
    fn substitute(&self, x: u16) -> u16;

    /// Applies the inverse S-box to all four nibbles in parallel.
    fn inv_substitute(&self, x: u16) -> u16;

    /// Applies the bit permutation. The wiring is self-inverse, so this is
    /// also the inverse permutation.
    fn permute(&self, x: u16) -> u16;

    /// Encrypts one block under the given subkeys.
    fn encrypt(&self, pt: u16, subkeys: &[u16; SUBKEYS]) -> u16;

    /// Decrypts one block under the given subkeys.
    fn decrypt(&self, ct: u16, subkeys: &[u16; SUBKEYS]) -> u16;
}

/// The toy SPN: 16-bit block, four rounds of (substitute, permute, xor)
/// where the last round omits the permutation, plus a whitening key
/// xored in before round 1.
#[derive(Clone, Debug)]
pub struct Spn {
    sbox: Sbox,
}

impl Spn {
    /// Creates an instance of the cipher over the given S-box.
    pub fn new(sbox: Sbox) -> Spn {
        Spn { sbox }
    }
}

impl Cipher for Spn {
    fn sbox(&self) -> &Sbox {
        &self.sbox
    }

    fn substitute(&self, x: u16) -> u16 {
        let mut y = self.sbox.apply(x & 0xf);
        y ^= self.sbox.apply((x >> 4) & 0xf) << 4;
        y ^= self.sbox.apply((x >> 8) & 0xf) << 8;
        y ^= self.sbox.apply((x >> 12) & 0xf) << 12;
        y
    }

    fn inv_substitute(&self, x: u16) -> u16 {
        let mut y = self.sbox.apply_inv(x & 0xf);
        y ^= self.sbox.apply_inv((x >> 4) & 0xf) << 4;
        y ^= self.sbox.apply_inv((x >> 8) & 0xf) << 8;
        y ^= self.sbox.apply_inv((x >> 12) & 0xf) << 12;
        y
    }

    fn permute(&self, x: u16) -> u16 {
        (x & 0x8421)
            | ((x & 0x0842) << 3)
            | ((x & 0x0084) << 6)
            | ((x & 0x0008) << 9)
            | ((x & 0x1000) >> 9)
            | ((x & 0x2100) >> 6)
            | ((x & 0x4210) >> 3)
    }

    fn encrypt(&self, pt: u16, subkeys: &[u16; SUBKEYS]) -> u16 {
        let mut x = pt ^ subkeys[0];

        for &subkey in subkeys.iter().take(ROUNDS).skip(1) {
            x = self.substitute(x);
            x = self.permute(x);
            x ^= subkey;
        }

        x = self.substitute(x);
        x ^ subkeys[ROUNDS]
    }

    fn decrypt(&self, ct: u16, subkeys: &[u16; SUBKEYS]) -> u16 {
        let mut x = ct ^ subkeys[ROUNDS];
        x = self.inv_substitute(x);

        for &subkey in subkeys.iter().take(ROUNDS).skip(1).rev() {
            x ^= subkey;
            x = self.permute(x);
            x = self.inv_substitute(x);
        }

        x ^ subkeys[0]
    }
}

/// Parses an 80-bit key given as exactly twenty lowercase hex digits into
/// the five 16-bit subkeys, leftmost group first.
pub fn parse_key(key: &str) -> Result<[u16; SUBKEYS], Error> {
    if key.len() != 4 * SUBKEYS {
        return Err(Error::BadKey(format!(
            "expected {} hex digits, got {}",
            4 * SUBKEYS,
            key.len()
        )));
    }

    if !key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
        return Err(Error::BadKey(String::from("expected lowercase hex digits")));
    }

    let mut subkeys = [0u16; SUBKEYS];
    for (i, subkey) in subkeys.iter_mut().enumerate() {
        *subkey = u16::from_str_radix(&key[4 * i..4 * i + 4], 16)
            .map_err(|_| Error::BadKey(String::from("expected lowercase hex digits")))?;
    }

    Ok(subkeys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const REFERENCE: &str = "6 10 11 15 12 2 13 5 3 8 0 1 14 7 4 9";

    fn reference_spn() -> Spn {
        Spn::new(REFERENCE.parse().expect("reference S-box parses"))
    }

    #[test]
    fn permutation_is_an_involution() {
        let cipher = reference_spn();

        for x in 0..=0xffffu16 {
            assert_eq!(cipher.permute(cipher.permute(x)), x);
        }
    }

    #[test]
    fn substitution_inverts() {
        let cipher = reference_spn();

        for x in 0..=0xffffu16 {
            assert_eq!(cipher.inv_substitute(cipher.substitute(x)), x);
            assert_eq!(cipher.substitute(cipher.inv_substitute(x)), x);
        }
    }

    #[test]
    fn known_encryption_vector() {
        // encrypt(0) with key aaaabbbbccccddddeeee, derived round by round:
        // aaaa -S-> 0000 -P-> 0000 ^bbbb, -S-> 1111 -P-> 000f ^cccc,
        // -S-> eeef -P-> fff1 ^dddd, -S-> bbbe ^eeee = 5550.
        let cipher = reference_spn();
        let subkeys = parse_key("aaaabbbbccccddddeeee").unwrap();

        assert_eq!(cipher.encrypt(0x0000, &subkeys), 0x5550);
        assert_eq!(cipher.decrypt(0x5550, &subkeys), 0x0000);
    }

    proptest! {
        #[test]
        fn encryption_round_trips(pt: u16, k0: u16, k1: u16, k2: u16, k3: u16, k4: u16) {
            let cipher = reference_spn();
            let subkeys = [k0, k1, k2, k3, k4];

            prop_assert_eq!(cipher.decrypt(cipher.encrypt(pt, &subkeys), &subkeys), pt);
        }
    }

    #[test]
    fn key_parsing() {
        assert_eq!(
            parse_key("aaaabbbbccccddddeeee").unwrap(),
            [0xaaaa, 0xbbbb, 0xcccc, 0xdddd, 0xeeee]
        );
        assert_eq!(
            parse_key("f993c0f7875a80a645cb").unwrap(),
            [0xf993, 0xc0f7, 0x875a, 0x80a6, 0x45cb]
        );
        assert!(parse_key("aaaabbbbccccddddeee").is_err());
        assert!(parse_key("aaaabbbbccccddddeeeee").is_err());
        assert!(parse_key("AAAABBBBCCCCDDDDEEEE").is_err());
        assert!(parse_key("aaaabbbbccccddddeeeg").is_err());
    }
}
