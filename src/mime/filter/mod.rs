//! Streaming byte filters and the chain that runs them.
//!
//! Each filter consumes input in arbitrary chunks and may hold back a small
//! tail (an incomplete base64 quad, a dangling `\r`, a partial line) until
//! more input arrives or the stream is completed.

pub mod charset;
pub mod crlf;
pub mod html;
pub mod transfer;

/// Input is fed through the chain in slices of this size.
const CHUNK_SIZE: usize = 4096;

/// One stage of a decoding chain.
pub trait Filter {
    /// Consume `input`, appending whatever can already be produced to `out`.
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>);

    /// End of stream: flush anything held back.
    fn complete(&mut self, out: &mut Vec<u8>);
}

/// An ordered list of filters; the output of each feeds the next.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter to the end of the chain.
    pub fn push(&mut self, filter: impl Filter + 'static) {
        self.filters.push(Box::new(filter));
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run `input` through every filter and complete the stream.
    pub fn run(mut self, input: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(input.len());

        for chunk in input.chunks(CHUNK_SIZE) {
            let produced = self.feed_from(0, chunk);
            output.extend_from_slice(&produced);
        }

        // Completing stage i may release bytes that stages i+1.. still have to see.
        for i in 0..self.filters.len() {
            let mut tail = Vec::new();
            self.filters[i].complete(&mut tail);
            let produced = self.feed_from(i + 1, &tail);
            output.extend_from_slice(&produced);
        }

        output
    }

    fn feed_from(&mut self, start: usize, input: &[u8]) -> Vec<u8> {
        let mut buf = input.to_vec();
        for filter in &mut self.filters[start..] {
            if buf.is_empty() {
                break;
            }
            let mut next = Vec::with_capacity(buf.len());
            filter.filter(&buf, &mut next);
            buf = next;
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Uppercases ASCII and holds back the last byte of every chunk.
    struct HoldLast {
        held: Option<u8>,
    }

    impl Filter for HoldLast {
        fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
            if let Some(b) = self.held.take() {
                out.push(b.to_ascii_uppercase());
            }
            if let Some((last, rest)) = input.split_last() {
                out.extend(rest.iter().map(|b| b.to_ascii_uppercase()));
                self.held = Some(*last);
            }
        }

        fn complete(&mut self, out: &mut Vec<u8>) {
            if let Some(b) = self.held.take() {
                out.push(b.to_ascii_uppercase());
            }
        }
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = FilterChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.run(b"abc"), b"abc");
    }

    #[test]
    fn test_completion_flushes_through_later_stages() {
        let mut chain = FilterChain::new();
        chain.push(HoldLast { held: None });
        chain.push(HoldLast { held: None });
        assert_eq!(chain.len(), 2);
        let input = vec![b'x'; CHUNK_SIZE * 2 + 3];
        let out = chain.run(&input);
        assert_eq!(out.len(), input.len());
        assert!(out.iter().all(|&b| b == b'X'));
    }
}
