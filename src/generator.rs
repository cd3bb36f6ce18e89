use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use std::io::{self, Write};

/// Largest slice of payload held in memory at once.
pub const PAYLOAD_CHUNK: usize = 64 * 1024;

/// Fills create and append payloads with pseudo-random bytes.
pub struct PayloadGen {
    rng: SmallRng,
    chunk: Vec<u8>,
}

impl PayloadGen {
    pub fn new(seed: u64) -> Self {
        PayloadGen {
            rng: SmallRng::seed_from_u64(seed),
            chunk: vec![],
        }
    }

    /// Writes `size` bytes to `out`, at most [`PAYLOAD_CHUNK`] at a time.
    pub fn write_to<W: Write + ?Sized>(&mut self, out: &mut W, size: u64) -> io::Result<()> {
        let mut left = size;
        while left > 0 {
            let n = usize::try_from(left).map_or(PAYLOAD_CHUNK, |l| l.min(PAYLOAD_CHUNK));
            self.chunk.resize(n, 0);
            self.rng.fill_bytes(&mut self.chunk);
            out.write_all(&self.chunk)?;
            left -= n as u64;
        }
        Ok(())
    }
}
