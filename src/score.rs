//! Scoring candidate subkeys against the code-book for a single trail.
//!
//! Each scorer partners every code-book entry with the entry whose index
//! differs by the trail's input difference, discards pairs that cannot
//! satisfy the trail, and counts for every candidate subkey how many
//! surviving pairs reproduce the trail's output difference after one
//! partial decryption (or encryption, on the plaintext side).

use std::sync::mpsc;

use fnv::FnvHashMap;
use itertools::Itertools;

use crate::bits;
use crate::cipher::{Cipher, ROUNDS, SUBKEYS};
use crate::codebook::CodeBook;
use crate::trail::Trail;

/// Count per candidate subkey.
pub type Histogram = FnvHashMap<u16, usize>;

/// All 16-bit values supported exactly on the active nibbles of `mask`,
/// in ascending order; `16^active_count` of them.
pub fn candidate_subkeys(mask: u16) -> Vec<u16> {
    let nibbles: Vec<Vec<u16>> = bits::active_nibbles(mask)
        .into_iter()
        .map(|i| (0..16).map(|v| bits::make_nibble(i, v)).collect())
        .collect();

    if nibbles.is_empty() {
        return Vec::new();
    }

    nibbles
        .iter()
        .multi_cartesian_product()
        .map(|parts| parts.into_iter().fold(0, |acc, &part| acc | part))
        .collect()
}

/// Partner table for an input difference: `partner[i] = side[i ^ diff]`.
pub fn partner(side: &[u16], input_diff: u16) -> Vec<u16> {
    (0..side.len())
        .map(|i| side[(i as u16 ^ input_diff) as usize])
        .collect()
}

/// Histogram for the last subkey: one inverse substitution away from the
/// ciphertexts.
pub fn last_subkey(cipher: &dyn Cipher, book: &CodeBook, trail: &Trail, verbose: u8) -> Histogram {
    score_outer(cipher, book.forward(), trail, false, verbose)
}

/// Histogram for the first subkey: the mirror image of `last_subkey`,
/// running over the inverse code-book with the forward substitution.
pub fn first_subkey(cipher: &dyn Cipher, book: &CodeBook, trail: &Trail, verbose: u8) -> Histogram {
    score_outer(cipher, book.inverse(), trail, true, verbose)
}

fn score_outer(
    cipher: &dyn Cipher,
    side: &[u16],
    trail: &Trail,
    encrypting: bool,
    verbose: u8,
) -> Histogram {
    let pc2 = partner(side, trail.input_diff);
    let mask = bits::expand_mask(trail.output_diff);
    let candidates = candidate_subkeys(mask);

    let mut hist = Histogram::default();
    let mut pairs = 0usize;

    for (i, &ct1) in side.iter().enumerate() {
        let ct2 = pc2[i];

        if (ct1 & !mask) != (ct2 & !mask) {
            continue;
        }

        pairs += 1;

        for &sk in &candidates {
            let (u1, u2) = if encrypting {
                (cipher.substitute(ct1 ^ sk), cipher.substitute(ct2 ^ sk))
            } else {
                (cipher.inv_substitute(ct1 ^ sk), cipher.inv_substitute(ct2 ^ sk))
            };

            if (u1 ^ u2) & mask == trail.output_diff {
                *hist.entry(sk).or_insert(0) += 1;
            }
        }
    }

    if verbose >= 2 {
        eprintln!("valid pairs: {}", pairs);
    }

    hist
}

/// Histogram for a middle subkey (round 2 or 3). The already-recovered
/// outer subkeys are peeled off every ciphertext first, then the pairs are
/// scored as in the last-round attack one layer deeper. This is the hot
/// loop of the whole attack; it is split over `threads` contiguous
/// code-book ranges, each worker counting into a private map.
pub fn middle_subkey(
    cipher: &dyn Cipher,
    book: &CodeBook,
    trail: &Trail,
    round: usize,
    subkeys: &[u16; SUBKEYS],
    threads: usize,
) -> Histogram {
    debug_assert!(round >= 2 && round < ROUNDS);

    let side = book.forward();
    let pc2 = partner(side, trail.input_diff);
    let mask = bits::expand_mask(trail.output_diff);
    let candidates = candidate_subkeys(mask);
    let output_diff = trail.output_diff;

    let threads = threads.max(1);
    let chunk = side.len() / threads;
    let (result_tx, result_rx) = mpsc::channel();

    crossbeam_utils::thread::scope(|scope| {
        for t in 0..threads {
            let result_tx = result_tx.clone();
            let pc2 = &pc2;
            let candidates = &candidates;

            let start = t * chunk;
            let end = if t + 1 == threads { side.len() } else { start + chunk };

            scope.spawn(move |_| {
                let mut local = Histogram::default();

                for i in start..end {
                    let mut ct1 = cipher.inv_substitute(side[i] ^ subkeys[ROUNDS]);
                    let mut ct2 = cipher.inv_substitute(pc2[i] ^ subkeys[ROUNDS]);

                    for r in (round + 1..ROUNDS).rev() {
                        ct1 = cipher.inv_substitute(cipher.permute(ct1 ^ subkeys[r]));
                        ct2 = cipher.inv_substitute(cipher.permute(ct2 ^ subkeys[r]));
                    }

                    if (ct1 & !mask) != (ct2 & !mask) {
                        continue;
                    }

                    for &sk in candidates.iter() {
                        let u1 = cipher.inv_substitute(cipher.permute(ct1 ^ sk));
                        let u2 = cipher.inv_substitute(cipher.permute(ct2 ^ sk));

                        if (u1 ^ u2) & mask == output_diff {
                            *local.entry(sk).or_insert(0) += 1;
                        }
                    }
                }

                result_tx
                    .send(local)
                    .expect("scoring worker could not send its histogram");
            });
        }
    })
    .expect("scoring workers failed to join");

    let mut hist = Histogram::default();
    for _ in 0..threads {
        let local = result_rx.recv().expect("missing worker histogram");

        for (sk, count) in local {
            *hist.entry(sk).or_insert(0) += count;
        }
    }

    hist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_count_and_support() {
        for &mask in [0xf000u16, 0x0f0f, 0xff00, 0xffff].iter() {
            let candidates = candidate_subkeys(mask);

            assert_eq!(
                candidates.len(),
                16usize.pow(bits::nibble_count(mask) as u32)
            );

            for &sk in &candidates {
                assert_eq!(sk & !mask, 0);
            }

            // Ascending and duplicate free.
            assert!(candidates.windows(2).all(|w| w[0] < w[1]));
        }

        assert!(candidate_subkeys(0).is_empty());
    }

    #[test]
    fn partner_pairs_by_difference() {
        let side: Vec<u16> = (0..65536u32).map(|x| (x as u16).wrapping_mul(31)).collect();
        let pc2 = partner(&side, 0x0102);

        for i in 0..65536usize {
            assert_eq!(pc2[i], side[i ^ 0x0102]);
        }
    }
}
