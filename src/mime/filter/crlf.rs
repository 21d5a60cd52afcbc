//! CRLF → LF line-ending normalization.

use super::Filter;

/// Replaces every `\r\n` with `\n`. Lone `\r` bytes are kept.
#[derive(Debug, Default)]
pub struct CrlfDecoder {
    pending_cr: bool,
}

impl Filter for CrlfDecoder {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &b in input {
            if self.pending_cr {
                self.pending_cr = false;
                if b != b'\n' {
                    out.push(b'\r');
                }
            }
            if b == b'\r' {
                self.pending_cr = true;
            } else {
                out.push(b);
            }
        }
    }

    fn complete(&mut self, out: &mut Vec<u8>) {
        if std::mem::take(&mut self.pending_cr) {
            out.push(b'\r');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chunks: &[&[u8]]) -> Vec<u8> {
        let mut filter = CrlfDecoder::default();
        let mut out = Vec::new();
        for chunk in chunks {
            filter.filter(chunk, &mut out);
        }
        filter.complete(&mut out);
        out
    }

    #[test]
    fn test_crlf_to_lf() {
        assert_eq!(run(&[b"a\r\nb\r\n"]), b"a\nb\n");
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        assert_eq!(run(&[b"a\r", b"\nb"]), b"a\nb");
    }

    #[test]
    fn test_lone_cr_kept() {
        assert_eq!(run(&[b"a\rb\r"]), b"a\rb\r");
    }

    #[test]
    fn test_double_cr_before_lf() {
        assert_eq!(run(&[b"a\r\r\n"]), b"a\r\n");
    }
}
