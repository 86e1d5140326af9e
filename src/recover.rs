//! Subkey recovery: turns trails and pair statistics into the full key.

use fnv::FnvHashMap;
use indexmap::IndexMap;

use crate::bits;
use crate::cipher::{Cipher, ROUNDS, SUBKEYS};
use crate::codebook::CodeBook;
use crate::errors::Error;
use crate::score::{self, Histogram};
use crate::trail::{self, SboxPattern};
use crate::utility::ProgressBar;

/// Knobs for a recovery run. The configuration is immutable; phases that
/// need different settings derive a new value instead of mutating shared
/// state.
#[derive(Clone, Copy, Debug)]
pub struct RecoveryConfig {
    /// Worker threads for the middle-round scorers.
    pub threads: usize,
    /// Also score the patterns with three active S-boxes.
    pub heur3: bool,
    /// Also score the pattern with four active S-boxes.
    pub heur4: bool,
    /// 0 = quiet, 1 = milestones, 2 = per-trail summaries, 3 = trail trace.
    pub verbose: u8,
}

impl RecoveryConfig {
    pub fn new() -> RecoveryConfig {
        RecoveryConfig {
            threads: 1,
            heur3: false,
            heur4: false,
            verbose: 0,
        }
    }

    /// The same configuration with the wide-pattern heuristics off, used
    /// for the first and last subkeys where single S-box patterns are
    /// both sufficient and much faster.
    pub fn without_heuristics(&self) -> RecoveryConfig {
        RecoveryConfig {
            heur3: false,
            heur4: false,
            ..*self
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> RecoveryConfig {
        RecoveryConfig::new()
    }
}

/// Drives the attack over one code-book. Already-recovered subkeys are
/// stored here and feed back into the deeper-round scorers.
pub struct Recovery<'a> {
    cipher: &'a dyn Cipher,
    codebook: &'a CodeBook,
    subkeys: [u16; SUBKEYS],
    config: RecoveryConfig,
}

impl<'a> Recovery<'a> {
    pub fn new(cipher: &'a dyn Cipher, codebook: &'a CodeBook, config: RecoveryConfig) -> Recovery<'a> {
        Recovery {
            cipher,
            codebook,
            subkeys: [0; SUBKEYS],
            config,
        }
    }

    /// The subkeys recovered (or seeded) so far.
    pub fn subkeys(&self) -> &[u16; SUBKEYS] {
        &self.subkeys
    }

    /// Seeds a known subkey, e.g. from a previous run.
    pub fn set_subkey(&mut self, round: usize, subkey: u16) {
        self.subkeys[round] = subkey;
    }

    /// The current subkeys as a 20-hex-digit key string.
    pub fn key_string(&self) -> String {
        self.subkeys.iter().map(|k| format!("{:04x}", k)).collect()
    }

    /// Whether encrypting every plaintext under `subkeys` reproduces the
    /// code-book.
    pub fn test_key(&self, subkeys: &[u16; SUBKEYS]) -> bool {
        self.codebook
            .forward()
            .iter()
            .enumerate()
            .all(|(pt, &ct)| self.cipher.encrypt(pt as u16, subkeys) == ct)
    }

    /// Recovers the last subkey. The heuristics are forced off: the
    /// narrow patterns carry enough signal here.
    pub fn recover_last(&mut self) -> Result<u16, Error> {
        let config = self.config.without_heuristics();

        if (self.config.heur3 || self.config.heur4) && config.verbose >= 1 {
            eprintln!("turning off the 3/4 S-box heuristics for key[{}]", ROUNDS);
        }

        let subkey = self.recover_round_with(ROUNDS, &config)?;
        self.subkeys[ROUNDS] = subkey;
        Ok(subkey)
    }

    /// Recovers the first subkey through the inverse code-book, again
    /// without the wide-pattern heuristics.
    pub fn recover_first(&mut self) -> Result<u16, Error> {
        let config = self.config.without_heuristics();

        if (self.config.heur3 || self.config.heur4) && config.verbose >= 1 {
            eprintln!("turning off the 3/4 S-box heuristics for key[0]");
        }

        let subkey = self.recover_round_with(0, &config)?;
        self.subkeys[0] = subkey;
        Ok(subkey)
    }

    /// Recovers the subkey of `round` under the run's configuration.
    /// Rounds 2 and 3 require every higher subkey to be present already.
    pub fn recover_round_subkey(&self, round: usize) -> Result<u16, Error> {
        self.recover_round_with(round, &self.config)
    }

    /// Recovers key[1] by exhaustion once the other four subkeys are in
    /// place: a single code-book equation pins it down.
    pub fn recover_second(&self) -> Result<u16, Error> {
        if self.config.verbose >= 1 {
            eprintln!("searching key[1] by exhaustion..");
        }

        let start = time::precise_time_s();
        let mut subkeys = self.subkeys;

        for k in 0..=0xffffu16 {
            subkeys[1] = k;

            if self.cipher.decrypt(self.codebook.ciphertext(0), &subkeys) == 0 {
                if self.config.verbose >= 1 {
                    eprintln!("found key[1] = {:04x}", k);
                    eprintln!("took: {:.3}s", time::precise_time_s() - start);
                }

                return Ok(k);
            }
        }

        Err(Error::SearchExhausted)
    }

    /// Recovers all five subkeys: last round first, then the middle rounds
    /// with the outer ones peeled off, then the first round, then key[1]
    /// by exhaustion.
    pub fn recover_all(&mut self) -> Result<[u16; SUBKEYS], Error> {
        let start = time::precise_time_s();

        if self.config.verbose >= 1 {
            eprintln!("starting full key recovery..");
        }

        self.recover_last()?;
        if self.config.verbose >= 1 {
            eprintln!("key[{}]={:04x}", ROUNDS, self.subkeys[ROUNDS]);
        }

        for round in (2..ROUNDS).rev() {
            let subkey = self.recover_round_subkey(round)?;
            self.subkeys[round] = subkey;

            if self.config.verbose >= 1 {
                eprintln!("key[{}]={:04x}", round, subkey);
            }
        }

        self.recover_first()?;
        if self.config.verbose >= 1 {
            eprintln!("key[0]={:04x}", self.subkeys[0]);
        }

        let second = self.recover_second()?;
        self.subkeys[1] = second;

        if self.config.verbose >= 1 {
            eprintln!("key[1]={:04x}", second);
            eprintln!("took: {:.3}s", time::precise_time_s() - start);
        }

        Ok(self.subkeys)
    }

    fn recover_round_with(&self, round: usize, config: &RecoveryConfig) -> Result<u16, Error> {
        assert!(round != 1, "key[1] is recovered by exhaustive search");

        if config.verbose >= 1 {
            eprintln!("guessing key[{}]..", round);
        }

        let start = time::precise_time_s();

        // One histogram per scored pattern, in ascending pattern order so
        // later tie-breaking is deterministic.
        let mut pattern_hists: IndexMap<u16, Histogram> = IndexMap::new();

        for state in 1..=0xfu16 {
            let pattern = SboxPattern::new(state);

            let scored = match pattern.active_count() {
                1 | 2 => true,
                3 => config.heur3,
                4 => config.heur4,
                _ => unreachable!(),
            };

            if !scored {
                continue;
            }

            if pattern.active_count() >= 3 && config.verbose >= 1 {
                eprintln!("doing {} S-boxes for key[{}]", pattern.active_count(), round);
            }

            let hist = self.pattern_histogram(round, &pattern, config)?;
            pattern_hists.insert(state, hist);
        }

        if config.verbose >= 1 {
            eprintln!("took: {:.3}s", time::precise_time_s() - start);
        }

        let mut subkey = 0u16;

        for nibble in 0..bits::NIBBLES {
            let winners = probable_nibble(nibble, &pattern_hists);

            match winners.len() {
                0 => return Err(Error::NoCandidate { round, nibble }),
                1 => {
                    if config.verbose >= 1 {
                        eprintln!(
                            "found key[{}] nibble {}: {:04x}",
                            round, nibble, winners[0].0
                        );
                    }
                }
                _ => {
                    if config.verbose >= 1 {
                        eprintln!("potential key[{}] nibble {} values:", round, nibble);
                        for &(key, count) in &winners {
                            eprintln!("\tkey={:04x}, count={}", key, count);
                        }
                        eprintln!("using the first one");
                    }
                }
            }

            subkey |= winners[0].0;
        }

        if config.verbose >= 1 {
            eprintln!("guessed key[{}] = {:04x}", round, subkey);
        }

        Ok(subkey)
    }

    /// Combined histogram for one pattern: the best trails are scored
    /// individually, and each trail contributes its argmax set weighted by
    /// the maximum count.
    fn pattern_histogram(
        &self,
        round: usize,
        pattern: &SboxPattern,
        config: &RecoveryConfig,
    ) -> Result<Histogram, Error> {
        // Attacking key[0] walks trails toward the ciphertext instead.
        let forward = round == 0;
        let from_round = if forward { ROUNDS } else { round };

        let trails = trail::best_trails(trail::generate(
            self.cipher,
            from_round,
            pattern,
            forward,
            config.verbose,
        ));

        if trails.is_empty() {
            return Err(Error::NoTrails {
                round,
                pattern: pattern.state,
            });
        }

        if config.verbose >= 1 {
            eprintln!(
                "processing trails to S-boxes {:04x} in round {}: {}",
                pattern.mask,
                round,
                trails.len()
            );
        }

        let mut progress = ProgressBar::new(trails.len());
        let mut combined = Histogram::default();

        for trail in &trails {
            if config.verbose >= 2 {
                eprintln!(
                    "trail input={:04x}, output={:04x}, mask={:04x}, prob={}",
                    trail.input_diff,
                    trail.output_diff,
                    bits::expand_mask(trail.output_diff),
                    trail.probability
                );
            }

            let hist = match round {
                ROUNDS => score::last_subkey(self.cipher, self.codebook, trail, config.verbose),
                0 => score::first_subkey(self.cipher, self.codebook, trail, config.verbose),
                _ => score::middle_subkey(
                    self.cipher,
                    self.codebook,
                    trail,
                    round,
                    &self.subkeys,
                    config.threads,
                ),
            };

            for (key, count) in find_max_in_hist(&hist) {
                *combined.entry(key).or_insert(0) += count;
            }

            if config.verbose >= 1 {
                progress.increment();
            }
        }

        Ok(combined)
    }
}

/// Merges the per-pattern statistics down to one nibble position and
/// returns its argmax set.
///
/// The histogram of the single pattern activating S-box `nibble` is the
/// baseline. Every wider pattern containing that S-box votes with its own
/// argmax set, masked down to the nibble, weighted by its maximum count.
fn probable_nibble(nibble: usize, pattern_hists: &IndexMap<u16, Histogram>) -> Vec<(u16, usize)> {
    let single = 1u16 << (3 - nibble);

    let mut main: Histogram = match pattern_hists.get(&single) {
        Some(hist) => hist.clone(),
        None => FnvHashMap::default(),
    };

    for (&state, hist) in pattern_hists {
        let pattern = SboxPattern::new(state);

        if pattern.active_count() < 2 || !pattern.contains(nibble) {
            continue;
        }

        for (key, count) in find_max_in_hist(hist) {
            *main.entry(key & bits::nibble_mask(nibble)).or_insert(0) += count;
        }
    }

    find_max_in_hist(&main)
}

/// All keys achieving the maximum count, in ascending key order. Callers
/// use the first entry when the set is not a singleton.
fn find_max_in_hist(hist: &Histogram) -> Vec<(u16, usize)> {
    let max = match hist.values().max() {
        Some(&max) => max,
        None => return Vec::new(),
    };

    let mut winners: Vec<(u16, usize)> = hist
        .iter()
        .filter(|&(_, &count)| count == max)
        .map(|(&key, &count)| (key, count))
        .collect();

    winners.sort_unstable_by_key(|&(key, _)| key);
    winners
}
