//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data.

use crate::encoding::convert_to_cp1252;

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers.
/// Text is converted to Windows-1252 on [`EscPosBuilder::build`].
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
}

impl EscPosBuilder {
    /// Create a builder; `width` is the separator length in characters
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(1024);
        // Initialize printer (ESC @)
        buf.extend_from_slice(&[0x1B, 0x40]);
        Self { buf, width }
    }

    // === Text Output ===

    /// Write raw text
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write `lines` bare line feeds
    pub fn blank_lines(&mut self, lines: usize) -> &mut Self {
        self.buf.extend(std::iter::repeat_n(b'\n', lines));
        self
    }

    // === Alignment ===

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    /// Align text to right
    pub fn right(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x02]);
        self
    }

    // === Text Style ===

    /// Enable bold text
    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    /// Disable bold text
    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    // === Separators ===

    /// Print a line of '-' characters
    pub fn sep_single(&mut self) -> &mut Self {
        self.line(&"-".repeat(self.width))
    }

    // === Paper Control ===

    /// Feed n dots then partial cut (GS V 66 n)
    ///
    /// Widely accepted by 58mm receipt models that ignore plain `GS V 1`.
    pub fn cut_feed(&mut self, n: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x42, n]);
        self
    }

    // === Build ===

    /// Build the final byte buffer with Windows-1252 text
    pub fn build(self) -> Vec<u8> {
        convert_to_cp1252(&self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_starts_with_init() {
        let mut b = EscPosBuilder::new(32);
        b.center().line("INVOICE").left();

        let data = b.build();
        assert_eq!(&data[..5], &[0x1B, 0x40, 0x1B, 0x61, 0x01]);
        assert_eq!(&data[data.len() - 3..], &[0x1B, 0x61, 0x00]);
    }

    #[test]
    fn test_emphasis_commands() {
        let mut b = EscPosBuilder::new(20);
        b.right().bold().line("TOTAL: 1.50").bold_off().left();

        let data = b.build();
        let mut expected = vec![0x1B, 0x61, 0x02, 0x1B, 0x45, 0x01];
        expected.extend_from_slice(b"TOTAL: 1.50\n");
        expected.extend_from_slice(&[0x1B, 0x45, 0x00, 0x1B, 0x61, 0x00]);
        assert_eq!(&data[2..], expected.as_slice());
    }

    #[test]
    fn test_separators() {
        let mut b = EscPosBuilder::new(10);
        b.sep_single();

        let data = b.build();
        let s = String::from_utf8_lossy(&data);
        assert!(s.contains("----------"));
    }

    #[test]
    fn test_cut_feed() {
        let mut b = EscPosBuilder::new(10);
        b.blank_lines(3).cut_feed(0x10);

        let data = b.build();
        assert!(data.ends_with(&[b'\n', b'\n', b'\n', 0x1D, 0x56, 0x42, 0x10]));
    }
}
