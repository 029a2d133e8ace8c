//! The fixed 2048-word BIP-39 English wordlist.

use std::sync::LazyLock;

const RAW: &str = include_str!("english.txt");

static WORDS: LazyLock<Vec<&'static str>> = LazyLock::new(|| RAW.split_whitespace().collect());

/// Number of entries in the wordlist.
pub const SIZE: usize = 2048;

/// Length of the longest word, useful for callers sizing display buffers.
pub fn longest_word_len() -> usize {
    WORDS.iter().map(|w| w.len()).max().unwrap_or(0)
}

/// Look up the word at `index` (0..2047).
pub fn word_at(index: u16) -> Option<&'static str> {
    WORDS.get(index as usize).copied()
}

/// Case-insensitive exact lookup of `word`'s index.
pub fn index_of(word: &str) -> Option<u16> {
    WORDS
        .iter()
        .position(|w| w.eq_ignore_ascii_case(word))
        .map(|i| i as u16)
}
