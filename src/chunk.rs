use std::io::{self, Read};
use std::num::NonZeroUsize;

use bytes::Bytes;

const MEGABYTE: usize = 1024 * 1024; // 1MiB
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(4 * MEGABYTE) {
    Some(size) => size,
    None => unreachable!(),
};

/// Lazily splits a reader into chunks of at most `chunk_size` bytes.
///
/// Every chunk except the last is exactly `chunk_size` bytes long. Reading
/// stops at end of stream without producing an empty chunk, and after an I/O
/// error the error is yielded once and the iterator is exhausted.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: NonZeroUsize,
    done: bool,
}

pub fn chunk_reader<R: Read>(reader: R, chunk_size: NonZeroUsize) -> ChunkReader<R> {
    ChunkReader {
        reader,
        chunk_size,
        done: false,
    }
}

impl<R> ChunkReader<R> {
    pub fn chunk_size(&self) -> NonZeroUsize {
        self.chunk_size
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let limit = self.chunk_size.get();
        let mut buffer = Vec::with_capacity(limit);
        match (&mut self.reader).take(limit as u64).read_to_end(&mut buffer) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => Some(Ok(Bytes::from(buffer))),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn collect(data: &[u8], chunk_size: usize) -> Vec<Bytes> {
        chunk_reader(Cursor::new(data.to_vec()), size(chunk_size))
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    /// Hands out at most `step` bytes per read call.
    struct Trickle {
        data: Cursor<Vec<u8>>,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.step);
            self.data.read(&mut buf[..n])
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[test]
    fn test_one_byte_chunks() {
        let chunks = collect(b"123abc", 1);
        assert_eq!(chunks, ["1", "2", "3", "a", "b", "c"]);
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        assert!(collect(b"", 4).is_empty());
    }

    #[test]
    fn test_chunk_count_and_sizes() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        for chunk_size in [1, 3, 7, 10, 999, 1000, 1001, 4096] {
            let chunks = collect(&data, chunk_size);
            assert_eq!(chunks.len(), data.len().div_ceil(chunk_size));

            let (last, init) = chunks.split_last().unwrap();
            assert!(init.iter().all(|c| c.len() == chunk_size));
            let tail = match data.len() % chunk_size {
                0 => chunk_size,
                rem => rem,
            };
            assert_eq!(last.len(), tail);

            assert_eq!(chunks.concat(), data);
        }
    }

    #[test]
    fn test_short_reads_are_coalesced() {
        let reader = Trickle {
            data: Cursor::new(b"Hello World!".to_vec()),
            step: 2,
        };
        let chunks: Vec<Bytes> = chunk_reader(reader, size(5))
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(chunks, ["Hello", " Worl", "d!"]);
    }

    #[test]
    fn test_error_ends_iteration() {
        let mut chunks = chunk_reader(Broken, size(8));
        assert!(matches!(chunks.next(), Some(Err(_))));
        assert!(chunks.next().is_none());
    }

    #[test]
    fn test_not_restartable() {
        let mut chunks = chunk_reader(Cursor::new(b"ab".to_vec()), size(1));
        assert_eq!(chunks.by_ref().count(), 2);
        assert!(chunks.next().is_none());
    }

    #[test]
    fn test_default_chunk_size() {
        assert_eq!(DEFAULT_CHUNK_SIZE.get(), 4 * 1024 * 1024);
    }
}
