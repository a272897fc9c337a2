//! Little cursor helpers over byte slices.

use crate::error::{Error, Result};

#[inline(always)]
pub(crate) fn need(buf: &[u8], want: usize, what: &str) -> Result<()> {
    if buf.len() < want {
        Err(Error::invalid(format!("truncated {what}")))
    } else {
        Ok(())
    }
}

#[inline(always)]
pub(crate) fn take<'a>(buf: &mut &'a [u8], n: usize, what: &str) -> Result<&'a [u8]> {
    need(buf, n, what)?;
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

#[inline(always)]
pub(crate) fn array<const N: usize>(buf: &mut &[u8], what: &str) -> Result<[u8; N]> {
    let b = take(buf, N, what)?;
    let mut out = [0u8; N];
    out.copy_from_slice(b);
    Ok(out)
}

#[inline(always)]
pub(crate) fn le_f32(buf: &mut &[u8], what: &str) -> Result<f32> {
    Ok(f32::from_le_bytes(array::<4>(buf, what)?))
}
