//! Writes the full code-book of the toy SPN for a known key, checking the
//! encrypt/decrypt round trip for every plaintext along the way.

use std::process;

use structopt::StructOpt;

use spncrack::cipher::{parse_key, Spn};
use spncrack::codebook;
use spncrack::errors::Error;
use spncrack::options::GeneratorOptions;
use spncrack::sbox::Sbox;

fn main() {
    let options = GeneratorOptions::from_args();

    match run(&options) {
        Ok(()) => eprintln!("ok"),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(err.exit_code());
        }
    }
}

fn run(options: &GeneratorOptions) -> Result<(), Error> {
    let sbox: Sbox = options.sbox.parse()?;
    let subkeys = parse_key(&options.key)?;
    let cipher = Spn::new(sbox);

    let book = codebook::generate(&cipher, &subkeys)?;
    book.write_file(&options.output)
}
