//! Key finder binary: mode dispatch around the recovery engine.
//!
//! Recovered subkeys go to stdout as `%04x`; all diagnostics and progress
//! go to stderr.

use std::process;

use structopt::StructOpt;

use spncrack::cipher::{parse_key, Cipher, Spn, ROUNDS};
use spncrack::codebook::CodeBook;
use spncrack::errors::Error;
use spncrack::options::KeyFinderOptions;
use spncrack::recover::{Recovery, RecoveryConfig};
use spncrack::sbox::Sbox;

fn main() {
    let options = KeyFinderOptions::from_args();

    if let Err(err) = run(&options) {
        eprintln!("{}", err);
        process::exit(err.exit_code());
    }
}

fn run(options: &KeyFinderOptions) -> Result<(), Error> {
    let modes = [
        options.first,
        options.last,
        !options.backward.is_empty(),
        options.find_all,
        options.test_key.is_some(),
        options.diff_table,
    ];

    if modes.iter().filter(|&&selected| selected).count() > 1 {
        return Err(Error::Usage(String::from(
            "the mode options are mutually exclusive",
        )));
    }

    let sbox: Sbox = options.sbox.parse()?;
    let cipher = Spn::new(sbox);
    let codebook = CodeBook::from_file(&options.ciphertext_list)?;

    let threads = if options.threads == 0 {
        num_cpus::get()
    } else {
        options.threads
    };

    let config = RecoveryConfig {
        threads,
        heur3: options.heur3 || options.heur4 || options.find_all,
        heur4: options.heur4 || options.find_all,
        verbose: options.verbose.min(3),
    };

    if config.verbose >= 1 {
        eprintln!("will use {} thread(s)", config.threads);
        if config.heur3 {
            eprintln!("will use 3 S-boxes");
        }
        if config.heur4 {
            eprintln!("will use 4 S-boxes");
        }
    }

    let mut recovery = Recovery::new(&cipher, &codebook, config);

    if options.first {
        let subkey = recovery.recover_first()?;
        println!("{:04x}", subkey);
    } else if options.last {
        let subkey = recovery.recover_last()?;
        println!("{:04x}", subkey);
    } else if !options.backward.is_empty() {
        recover_backward(&mut recovery, &options.backward)?;
    } else if options.find_all {
        recovery.recover_all()?;
        println!("{}", recovery.key_string());
    } else if let Some(key) = &options.test_key {
        let subkeys = parse_key(key)?;

        if !recovery.test_key(&subkeys) {
            return Err(Error::KeyMismatch);
        }

        eprintln!("key is ok");
    } else if options.diff_table {
        print_diff_table(&cipher);
    } else {
        eprintln!("nothing to do, try --help");
    }

    Ok(())
}

/// Seeds the listed subkeys from the last round downward and recovers the
/// next one below them.
fn recover_backward(recovery: &mut Recovery, given: &[String]) -> Result<(), Error> {
    if given.len() >= ROUNDS {
        return Err(Error::Usage(String::from("too many subkeys listed")));
    }

    for (i, value) in given.iter().enumerate() {
        let subkey = u16::from_str_radix(value, 16)
            .map_err(|_| Error::Usage(format!("cannot parse subkey in list: {}", value)))?;
        let round = ROUNDS - i;

        recovery.set_subkey(round, subkey);
        eprintln!("using a given key[{}]={:04x}", round, subkey);
    }

    let wanted = ROUNDS - given.len();
    if wanted <= 1 {
        return Err(Error::Usage(String::from(
            "key[0] and key[1] need another mode, see --first and --find-all",
        )));
    }

    eprintln!("starting key[{}] recovery", wanted);
    let subkey = recovery.recover_round_subkey(wanted)?;
    println!("{:04x}", subkey);

    Ok(())
}

fn print_diff_table(cipher: &Spn) {
    for row in cipher.sbox().ddt() {
        for &entry in row {
            print!("{:2} ", entry);
        }
        println!();
    }
}
