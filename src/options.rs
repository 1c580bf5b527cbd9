//! Decode options: resource limits against adversarial streams.
//!
//! Das Wire-Format traegt Laengenangaben, denen der Decoder vorab glauben
//! muss (String-Laengen, Array-Groessen, beliebig tiefe Verschachtelung).
//! Die Limits hier deckeln das, bevor Speicher oder Stack kippen.
//! Default ist unbegrenzt — Paritaet mit dem Originalleser.
//!
//! # Beispiel
//!
//! ```
//! use jodec::DecodeOptions;
//!
//! let opts = DecodeOptions::default()
//!     .with_max_string_length(1 << 20)
//!     .with_max_depth(256);
//!
//! assert_eq!(opts.max_string_length(), Some(1 << 20));
//! assert_eq!(opts.max_array_length(), None);
//! assert_eq!(opts.max_depth(), Some(256));
//! ```

/// Limits applied during one decode session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    max_string_length: Option<u64>,
    max_array_length: Option<u32>,
    max_depth: Option<usize>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Getter ---

    /// Maximale String-Laenge in Bytes (modified-UTF-8-Body).
    pub fn max_string_length(&self) -> Option<u64> {
        self.max_string_length
    }

    /// Maximale Elementanzahl pro Array.
    pub fn max_array_length(&self) -> Option<u32> {
        self.max_array_length
    }

    /// Maximale Rekursionstiefe eines Graph-Decodes.
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    // --- Builder ---

    /// Deckelt die String-Laenge (Bytes).
    pub fn with_max_string_length(mut self, max: u64) -> Self {
        self.max_string_length = Some(max);
        self
    }

    /// Deckelt die Array-Groesse (Elemente).
    pub fn with_max_array_length(mut self, max: u32) -> Self {
        self.max_array_length = Some(max);
        self
    }

    /// Deckelt die Rekursionstiefe.
    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = Some(max);
        self
    }
}
