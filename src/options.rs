//! Command line definitions for the key finder and the code-book generator.

use structopt::StructOpt;

#[derive(Clone, Debug, StructOpt)]
#[structopt(
    name = "spncrack",
    about = "Recover the key of a toy SPN cipher from its full code-book by differential cryptanalysis."
)]
pub struct KeyFinderOptions {
    /// List of ciphertexts, one 4-digit hex value per line, line i holding
    /// the ciphertext of plaintext i.
    pub ciphertext_list: String,

    /// Space separated decimal S-box values,
    /// e.g. "6 10 11 15 12 2 13 5 3 8 0 1 14 7 4 9".
    pub sbox: String,

    /// Print more descriptive messages. 1 = milestones, 2 = per-trail
    /// summaries, 3 = full trail search trace.
    #[structopt(short = "v", long = "verbose", default_value = "0")]
    pub verbose: u8,

    /// Number of worker threads for the middle-round scorers.
    /// 0 = one per logical CPU.
    #[structopt(short = "t", long = "threads", default_value = "1")]
    pub threads: usize,

    /// Also score the patterns with 3 active S-boxes. More accurate than
    /// the default 2, but ~10x slower.
    #[structopt(long = "heur3")]
    pub heur3: bool,

    /// Also score the pattern with 4 active S-boxes; implies --heur3.
    /// Best accuracy, slowest.
    #[structopt(long = "heur4")]
    pub heur4: bool,

    /// Recover the first subkey only.
    #[structopt(short = "f", long = "first")]
    pub first: bool,

    /// Recover the last subkey only.
    #[structopt(short = "l", long = "last")]
    pub last: bool,

    /// Recover the next subkey below the listed ones. Comma separated,
    /// last subkey first, each hhhh.
    #[structopt(long = "backward", use_delimiter = true)]
    pub backward: Vec<String>,

    /// Recover the entire key. Enables --heur3 and --heur4.
    /// CAUTION: this takes a long time.
    #[structopt(short = "a", long = "find-all")]
    pub find_all: bool,

    /// Encrypt every plaintext with the given 20-hex-digit key and compare
    /// against the code-book.
    #[structopt(long = "test-key")]
    pub test_key: Option<String>,

    /// Print the difference distribution table of the S-box.
    #[structopt(short = "d", long = "diff-table")]
    pub diff_table: bool,
}

#[derive(Clone, Debug, StructOpt)]
#[structopt(
    name = "generate",
    about = "Generate the full code-book of the toy SPN for a given key."
)]
pub struct GeneratorOptions {
    /// Space separated decimal S-box values.
    pub sbox: String,

    /// The key as 20 hex digits, five 16-bit subkeys leftmost first.
    pub key: String,

    /// Output file, one ciphertext per line.
    pub output: String,
}
