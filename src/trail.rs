//! Differential trails and their greedy enumeration through the network.

use smallvec::SmallVec;

use crate::bits;
use crate::cipher::Cipher;
use crate::score;

/// Which S-boxes of a layer carry a non-zero difference. Bit `3 - i` of
/// `state` corresponds to S-box `i`, so pattern `1 << (3 - i)` activates
/// exactly the i'th (leftmost = 0) S-box.
#[derive(Clone, Debug)]
pub struct SboxPattern {
    /// The raw 4-bit pattern, 1..=15.
    pub state: u16,
    /// The 16-bit mask with every active nibble expanded to `0xf`.
    pub mask: u16,
    /// One single-nibble mask per active S-box, leftmost first.
    pub nibble_masks: SmallVec<[u16; bits::NIBBLES]>,
}

impl SboxPattern {
    /// Derives the masks for a raw pattern in 1..=15.
    pub fn new(state: u16) -> SboxPattern {
        debug_assert!(state >= 1 && state <= 0xf);

        let mut mask = 0;
        let mut nibble_masks = SmallVec::new();

        for i in 0..bits::NIBBLES {
            if state & (1 << (3 - i)) != 0 {
                mask |= bits::nibble_mask(i);
                nibble_masks.push(bits::nibble_mask(i));
            }
        }

        SboxPattern {
            state,
            mask,
            nibble_masks,
        }
    }

    /// Number of active S-boxes, 1..=4.
    pub fn active_count(&self) -> usize {
        self.nibble_masks.len()
    }

    /// Whether S-box `i` is active in this pattern.
    pub fn contains(&self, i: usize) -> bool {
        self.state & (1 << (3 - i)) != 0
    }
}

/// A differential trail: the plaintext-side difference entering the attacked
/// wrapper, the difference at the layer just before the attacked subkey, and
/// the product of the per-round best DDT fractions.
#[derive(Clone, Copy, Debug)]
pub struct Trail {
    pub input_diff: u16,
    pub output_diff: u16,
    pub probability: f64,
}

/// Enumerates one trail per input difference at layer `from_round` that is
/// compatible with `pattern`, walking the remaining rounds greedily through
/// the DDT. `forward` selects the transposed table, used when attacking the
/// first subkey through the inverse code-book.
pub fn generate(
    cipher: &dyn Cipher,
    from_round: usize,
    pattern: &SboxPattern,
    forward: bool,
    verbose: u8,
) -> Vec<Trail> {
    let mut trails = Vec::new();

    // Differences restricted to the active S-boxes, each active nibble
    // non-zero.
    let layer_diffs = score::candidate_subkeys(pattern.mask)
        .into_iter()
        .filter(|&u| pattern.nibble_masks.iter().all(|&m| u & m != 0));

    for u in layer_diffs {
        if verbose >= 3 {
            eprintln!(
                "v{}={:04x} u{}={:04x}",
                from_round - 1,
                cipher.permute(u),
                from_round,
                u
            );
        }

        let mut prev = u;
        let mut probability = 1.0;

        for round in (1..from_round).rev() {
            prev = extend_round(cipher, round, prev, &mut probability, forward, verbose);
        }

        if verbose >= 3 {
            eprintln!("input diff: {:04x} ({:04x})", prev, bits::expand_mask(prev));
            eprintln!("output diff: {:04x}", u);
            eprintln!("probability: {}", probability);
            eprintln!("-------------");
        }

        trails.push(Trail {
            input_diff: prev,
            output_diff: u,
            probability,
        });
    }

    trails
}

/// Extends a trail by one round: finds for each active S-box of the layer
/// output difference the input difference with the highest DDT count,
/// breaking ties toward the fewest active S-boxes in the next layer.
fn extend_round(
    cipher: &dyn Cipher,
    round: usize,
    prev_in_diff: u16,
    probability: &mut f64,
    forward: bool,
    verbose: u8,
) -> u16 {
    let sbox = cipher.sbox();
    let table = if forward {
        sbox.ddt_transposed()
    } else {
        sbox.ddt()
    };

    let out_diff = cipher.permute(prev_in_diff);
    let mut in_diff = 0u16;

    if verbose >= 3 {
        eprintln!("round {}:", round);
        eprintln!("\tv{}={:04x}", round, out_diff);
    }

    for i in bits::active_nibbles(out_diff) {
        let dy = bits::nibble_of(i, out_diff) as usize;

        let mut max_count = 0u16;
        for dx in 1..16 {
            if table[dx][dy] > max_count {
                max_count = table[dx][dy];
            }
        }

        *probability *= f64::from(max_count) / 16.0;

        // Any of the best input differences preserves this round's
        // probability; whichever we pick decides how many S-boxes the next
        // layer activates, so take the narrowest. The first strict
        // improvement wins ties.
        let mut lowest_active = bits::NIBBLES + 1;

        for dx in 1..16u16 {
            if table[dx as usize][dy] != max_count {
                continue;
            }

            let candidate = in_diff | bits::make_nibble(i, dx);
            let next_out_diff = cipher.permute(candidate);
            let next_active = bits::nibble_count(next_out_diff);

            if verbose >= 3 {
                eprintln!(
                    "\tsbox={}, dx={}, dy={}, count={}, in_diff={:04x}, next_out_diff={:04x}, active_in_next={}",
                    i, dx, dy, max_count, candidate, next_out_diff, next_active
                );
            }

            if next_active < lowest_active {
                lowest_active = next_active;
                in_diff = candidate;
            }
        }

        if verbose >= 3 {
            eprintln!("\tusing lowest count {} for sbox={}", lowest_active, i);
        }
    }

    if verbose >= 3 {
        eprintln!("\tu{}={:04x}", round, in_diff);
    }

    in_diff
}

/// Keeps the trails whose probability equals the maximum. The comparison is
/// exact: equal trails compute identical factor sequences, and ties are
/// common and must all be scored.
pub fn best_trails(trails: Vec<Trail>) -> Vec<Trail> {
    let mut best = 0.0f64;

    for trail in &trails {
        if trail.probability > best {
            best = trail.probability;
        }
    }

    trails
        .into_iter()
        .filter(|trail| trail.probability == best)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::Spn;

    fn reference_spn() -> Spn {
        Spn::new("6 10 11 15 12 2 13 5 3 8 0 1 14 7 4 9".parse().unwrap())
    }

    #[test]
    fn pattern_masks() {
        let pattern = SboxPattern::new(0b1010);
        assert_eq!(pattern.mask, 0xf0f0);
        assert_eq!(pattern.nibble_masks.as_slice(), &[0xf000, 0x00f0]);
        assert_eq!(pattern.active_count(), 2);
        assert!(pattern.contains(0));
        assert!(!pattern.contains(1));
        assert!(pattern.contains(2));

        let pattern = SboxPattern::new(0b0001);
        assert_eq!(pattern.mask, 0x000f);
        assert_eq!(pattern.active_count(), 1);
        assert!(pattern.contains(3));
    }

    #[test]
    fn trails_cover_the_pattern() {
        let cipher = reference_spn();

        for state in 1..=0xf {
            let pattern = SboxPattern::new(state);
            let trails = generate(&cipher, 4, &pattern, false, 0);

            // One trail per admissible layer difference.
            assert_eq!(trails.len(), 15usize.pow(pattern.active_count() as u32));

            for trail in &trails {
                assert_eq!(trail.output_diff & !pattern.mask, 0);
                for &mask in &pattern.nibble_masks {
                    assert_ne!(trail.output_diff & mask, 0);
                }
            }
        }
    }

    #[test]
    fn probabilities_are_in_range() {
        let cipher = reference_spn();

        for state in [0b1000u16, 0b0110, 0b1111].iter() {
            let pattern = SboxPattern::new(*state);

            for trail in generate(&cipher, 4, &pattern, false, 0) {
                assert!(trail.probability > 0.0);
                assert!(trail.probability <= 1.0);
            }

            for trail in generate(&cipher, 4, &pattern, true, 0) {
                assert!(trail.probability > 0.0);
                assert!(trail.probability <= 1.0);
            }
        }
    }

    #[test]
    fn best_trails_share_the_maximum() {
        let cipher = reference_spn();
        let pattern = SboxPattern::new(0b0100);

        let all = generate(&cipher, 4, &pattern, false, 0);
        let max = all
            .iter()
            .map(|t| t.probability)
            .fold(0.0f64, |a, b| a.max(b));

        let best = best_trails(all);
        assert!(!best.is_empty());
        for trail in &best {
            assert_eq!(trail.probability, max);
        }
    }
}
