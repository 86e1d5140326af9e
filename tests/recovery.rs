//! End-to-end recovery against an in-memory code-book.

use spncrack::cipher::{parse_key, Spn};
use spncrack::codebook::{self, CodeBook};
use spncrack::recover::{Recovery, RecoveryConfig};
use spncrack::score;
use spncrack::trail::{self, SboxPattern};

const SBOX: &str = "6 10 11 15 12 2 13 5 3 8 0 1 14 7 4 9";
const KEY: &str = "aaaabbbbccccddddeeee";

fn setup() -> (Spn, CodeBook) {
    let cipher = Spn::new(SBOX.parse().unwrap());
    let subkeys = parse_key(KEY).unwrap();
    let book = codebook::generate(&cipher, &subkeys).expect("self-check holds");
    (cipher, book)
}

#[test]
fn last_subkey_recovers() {
    let (cipher, book) = setup();
    let mut recovery = Recovery::new(&cipher, &book, RecoveryConfig::new());

    assert_eq!(recovery.recover_last().unwrap(), 0xeeee);
}

#[test]
fn first_subkey_recovers() {
    let (cipher, book) = setup();
    let mut recovery = Recovery::new(&cipher, &book, RecoveryConfig::new());

    assert_eq!(recovery.recover_first().unwrap(), 0xaaaa);
}

#[test]
fn exhaustion_finds_the_second_subkey() {
    let (cipher, book) = setup();
    let mut recovery = Recovery::new(&cipher, &book, RecoveryConfig::new());

    recovery.set_subkey(0, 0xaaaa);
    recovery.set_subkey(2, 0xcccc);
    recovery.set_subkey(3, 0xdddd);
    recovery.set_subkey(4, 0xeeee);

    assert_eq!(recovery.recover_second().unwrap(), 0xbbbb);
}

#[test]
fn exhaustion_fails_on_wrong_subkeys() {
    let (cipher, book) = setup();
    let mut recovery = Recovery::new(&cipher, &book, RecoveryConfig::new());

    recovery.set_subkey(0, 0xaaaa);
    recovery.set_subkey(2, 0xcccc);
    recovery.set_subkey(3, 0xdddd);
    recovery.set_subkey(4, 0x0000);

    assert!(recovery.recover_second().is_err());
}

#[test]
fn test_key_accepts_the_generating_key_only() {
    let (cipher, book) = setup();
    let recovery = Recovery::new(&cipher, &book, RecoveryConfig::new());

    assert!(recovery.test_key(&parse_key(KEY).unwrap()));
    assert!(!recovery.test_key(&parse_key("aaaabbbbccccddddeeef").unwrap()));
}

#[test]
fn middle_scorer_is_thread_count_invariant() {
    let (cipher, book) = setup();
    let subkeys = parse_key(KEY).unwrap();

    let pattern = SboxPattern::new(0b0100);
    let trails = trail::best_trails(trail::generate(&cipher, 3, &pattern, false, 0));
    assert!(!trails.is_empty());

    let single = score::middle_subkey(&cipher, &book, &trails[0], 3, &subkeys, 1);
    let multi = score::middle_subkey(&cipher, &book, &trails[0], 3, &subkeys, 3);

    assert_eq!(single, multi);
}

// The full pipeline with the wide-pattern heuristics is the long benchmark;
// run with `cargo test --release -- --ignored`.
#[test]
#[ignore]
fn full_key_recovery() {
    let (cipher, book) = setup();
    let config = RecoveryConfig {
        threads: 4,
        heur3: true,
        heur4: true,
        verbose: 0,
    };
    let mut recovery = Recovery::new(&cipher, &book, config);

    let subkeys = recovery.recover_all().unwrap();
    assert_eq!(subkeys, [0xaaaa, 0xbbbb, 0xcccc, 0xdddd, 0xeeee]);
    assert_eq!(recovery.key_string(), KEY);
}
