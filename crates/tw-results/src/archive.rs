//! Versioned binary replay archive.
//!
//! Layout, all integers and floats little-endian:
//!
//! ```text
//! header      magic "TWRP", version u32, steps u32, channels u32
//! names       per channel: byte length u32, UTF-8 bytes
//! times       steps x f64
//! values      per step, per channel: length u32, length x f32
//! frames (v2) per step: present u32; if 1: segments u32, 6 x f32 each,
//!             particles u32, 3 x f32 each
//! ```
//!
//! Version 1 archives end after the values; readers accept every version up
//! to [`CURRENT_ARCHIVE_VERSION`].

use crate::replay::{ReplayStore, WakeFrame};
use crate::{ResultsError, ResultsResult};

pub const ARCHIVE_MAGIC: [u8; 4] = *b"TWRP";
pub const CURRENT_ARCHIVE_VERSION: u32 = 2;

/// First version carrying wake geometry frames.
const FRAMES_SINCE: u32 = 2;

const HEADER_LEN: usize = 16;

/// Fixed-width scalars stored little-endian.
trait LeScalar: Copy {
    const SIZE: usize;
    fn put(self, out: &mut Vec<u8>);
    fn get(bytes: &[u8]) -> Self;
}

macro_rules! le_scalar {
    ($($t:ty),*) => {$(
        impl LeScalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            fn put(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
            fn get(bytes: &[u8]) -> Self {
                let mut raw = [0_u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_le_bytes(raw)
            }
        }
    )*};
}

le_scalar!(u32, f32, f64);

pub fn write_archive(store: &ReplayStore) -> ResultsResult<Vec<u8>> {
    write_archive_version(store, CURRENT_ARCHIVE_VERSION)
}

/// Write an archive readable by older tools. Frames are dropped below
/// version 2.
pub fn write_archive_version(store: &ReplayStore, version: u32) -> ResultsResult<Vec<u8>> {
    if version == 0 || version > CURRENT_ARCHIVE_VERSION {
        return Err(ResultsError::UnsupportedVersion { version });
    }
    let mut out = Vec::new();
    out.extend_from_slice(&ARCHIVE_MAGIC);
    version.put(&mut out);
    count(store.len())?.put(&mut out);
    count(store.channel_names().len())?.put(&mut out);
    for name in store.channel_names() {
        count(name.len())?.put(&mut out);
        out.extend_from_slice(name.as_bytes());
    }
    put_all(&mut out, store.times());
    for row in store.rows() {
        for values in row {
            count(values.len())?.put(&mut out);
            put_all(&mut out, values.as_slice());
        }
    }
    if version >= FRAMES_SINCE {
        for frame in store.frames() {
            match frame {
                None => 0_u32.put(&mut out),
                Some(f) => {
                    1_u32.put(&mut out);
                    count(f.segments.len())?.put(&mut out);
                    put_all::<f32>(&mut out, bytemuck::cast_slice(&f.segments));
                    count(f.particles.len())?.put(&mut out);
                    put_all::<f32>(&mut out, bytemuck::cast_slice(&f.particles));
                }
            }
        }
    }
    Ok(out)
}

fn count(n: usize) -> ResultsResult<u32> {
    u32::try_from(n).map_err(|_| ResultsError::Archive {
        what: format!("{n} entries exceed the archive limit"),
    })
}

fn put_all<T: LeScalar>(out: &mut Vec<u8>, values: &[T]) {
    out.reserve(values.len() * T::SIZE);
    for v in values {
        v.put(out);
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> ResultsResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.bytes.len())
            .ok_or_else(|| ResultsError::Archive {
                what: format!("truncated at byte {}", self.pos),
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> ResultsResult<u32> {
        Ok(u32::get(self.take(4)?))
    }

    fn len(&mut self) -> ResultsResult<usize> {
        Ok(self.u32()? as usize)
    }

    /// A count from the input, refused when `n` entries of at least
    /// `min_bytes` each cannot fit in what is left.
    fn bounded(&self, n: usize, min_bytes: usize, what: &str) -> ResultsResult<usize> {
        match n.checked_mul(min_bytes) {
            Some(needed) if needed <= self.remaining() => Ok(n),
            _ => Err(ResultsError::Archive {
                what: format!("{n} {what} do not fit in {} remaining bytes", self.remaining()),
            }),
        }
    }

    fn scalars<T: LeScalar>(&mut self, n: usize) -> ResultsResult<Vec<T>> {
        let bytes = self.take(n.checked_mul(T::SIZE).ok_or_else(|| ResultsError::Archive {
            what: "length overflow".to_string(),
        })?)?;
        Ok(bytes.chunks_exact(T::SIZE).map(T::get).collect())
    }

    fn records<const N: usize>(&mut self, n: usize) -> ResultsResult<Vec<[f32; N]>>
    where
        [f32; N]: bytemuck::Pod,
    {
        let flat: Vec<f32> = self.scalars(n.checked_mul(N).ok_or_else(|| ResultsError::Archive {
            what: "length overflow".to_string(),
        })?)?;
        Ok(bytemuck::cast_slice(&flat).to_vec())
    }
}

pub fn read_archive(bytes: &[u8]) -> ResultsResult<ReplayStore> {
    let mut r = Reader { bytes, pos: 0 };
    let header = r.take(HEADER_LEN)?;
    if header[..4] != ARCHIVE_MAGIC {
        return Err(ResultsError::Archive {
            what: "not a replay archive".to_string(),
        });
    }
    let version = u32::get(&header[4..8]);
    if version == 0 || version > CURRENT_ARCHIVE_VERSION {
        return Err(ResultsError::UnsupportedVersion { version });
    }
    let channel_count = r.bounded(u32::get(&header[12..16]) as usize, 4, "channels")?;

    let mut channels = Vec::with_capacity(channel_count);
    for _ in 0..channel_count {
        let n = r.len()?;
        let name = std::str::from_utf8(r.take(n)?).map_err(|e| ResultsError::Archive {
            what: format!("channel name: {e}"),
        })?;
        channels.push(name.to_string());
    }
    // every step carries a time and one length per channel
    let step_bytes = channel_count.checked_mul(4).and_then(|c| c.checked_add(8));
    let steps = r.bounded(u32::get(&header[8..12]) as usize, step_bytes.unwrap_or(usize::MAX), "steps")?;
    let times: Vec<f64> = r.scalars(steps)?;
    let mut rows = Vec::with_capacity(steps);
    for _ in 0..steps {
        let mut row = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            let n = r.len()?;
            row.push(r.scalars::<f32>(n)?);
        }
        rows.push(row);
    }
    let mut frames = Vec::with_capacity(steps);
    for _ in 0..steps {
        if version < FRAMES_SINCE || r.u32()? == 0 {
            frames.push(None);
            continue;
        }
        let n = r.len()?;
        let segments = r.records::<6>(n)?;
        let n = r.len()?;
        let particles = r.records::<3>(n)?;
        frames.push(Some(WakeFrame {
            segments,
            particles,
        }));
    }
    if r.pos != bytes.len() {
        return Err(ResultsError::Archive {
            what: format!("{} trailing bytes", bytes.len() - r.pos),
        });
    }
    Ok(ReplayStore::from_parts(channels, times, rows, frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ReplayStore {
        let mut s = ReplayStore::new(vec!["T1 power".into(), "T1 span gamma".into()]).unwrap();
        s.append(0.1, vec![vec![1.5], vec![0.5, 0.25]], None).unwrap();
        s.append(
            0.2,
            vec![vec![2.5], vec![0.75, 0.125]],
            Some(WakeFrame {
                segments: vec![[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]],
                particles: vec![[9.0, 8.0, 7.0], [1.0, 1.0, 1.0]],
            }),
        )
        .unwrap();
        s
    }

    #[test]
    fn current_version_keeps_frames() {
        let s = store();
        let back = read_archive(&write_archive(&s).unwrap()).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.frame(1).unwrap().particles.len(), 2);
    }

    #[test]
    fn version_one_omits_frames() {
        let s = store();
        let bytes = write_archive_version(&s, 1).unwrap();
        let back = read_archive(&bytes).unwrap();
        assert_eq!(back.times(), s.times());
        assert_eq!(back.series("T1 power", 0), s.series("T1 power", 0));
        assert!(!back.has_frames());
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut bytes = write_archive(&store()).unwrap();
        bytes[4..8].copy_from_slice(&(CURRENT_ARCHIVE_VERSION + 1).to_le_bytes());
        assert!(matches!(
            read_archive(&bytes),
            Err(ResultsError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn corrupt_input_is_an_error() {
        let bytes = write_archive(&store()).unwrap();
        assert!(read_archive(&bytes[..bytes.len() - 3]).is_err());
        assert!(read_archive(b"NOPE").is_err());
        let mut wrong = bytes.clone();
        wrong[0] = b'X';
        assert!(read_archive(&wrong).is_err());
    }

    #[test]
    fn header_and_values_are_little_endian() {
        let bytes = write_archive(&store()).unwrap();
        assert_eq!(&bytes[..4], b"TWRP");
        assert_eq!(bytes[4..8], [2, 0, 0, 0]);
        assert_eq!(bytes[8..12], [2, 0, 0, 0]);
        assert_eq!(bytes[12..16], [2, 0, 0, 0]);
        // "T1 power" length prefix
        assert_eq!(bytes[16..20], [8, 0, 0, 0]);
        let names = 4 + 8 + 4 + 13;
        let first_time = &bytes[16 + names..16 + names + 8];
        assert_eq!(first_time, 0.1_f64.to_le_bytes());
    }

    #[test]
    fn forged_counts_fail_without_allocating() {
        let mut forged = Vec::new();
        forged.extend_from_slice(b"TWRP");
        forged.extend_from_slice(&2_u32.to_le_bytes());
        forged.extend_from_slice(&u32::MAX.to_le_bytes());
        forged.extend_from_slice(&u32::MAX.to_le_bytes());
        assert_eq!(forged.len(), 16);
        assert!(matches!(read_archive(&forged), Err(ResultsError::Archive { .. })));

        // plausible channels, absurd step count
        let mut bytes = write_archive(&store()).unwrap();
        bytes[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(read_archive(&bytes), Err(ResultsError::Archive { .. })));

        // absurd per-value length
        let mut bytes = write_archive(&store()).unwrap();
        let names = 4 + 8 + 4 + 13;
        let first_len = 16 + names + 2 * 8;
        bytes[first_len..first_len + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(read_archive(&bytes).is_err());
    }
}
