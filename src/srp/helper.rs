use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use digest::Digest;
use num_bigint::{BigInt, BigUint};
use rand::RngCore;

use crate::constant::{DERIVE_KEY_INFO, G, N};

/// Byte length of the random ephemeral secret `a`.
const EPHEMERAL_BYTES: usize = 128;

/// Byte length of the random salt hashed into a new device verifier.
const DEVICE_SALT_BYTES: usize = 16;

/// Byte length of the random password generated for a new device, before
/// base64 encoding.
const DEVICE_PASSWORD_BYTES: usize = 40;

/// Prefix the bytes with `pad` when the leading bit is set.
///
/// Big-endian magnitudes fed into the protocol's hashes must not be
/// interpretable as negative two's-complement numbers; the server applies the
/// same rule, and a single missing (or extra) zero byte changes every digest
/// derived from the value.
pub(crate) fn left_pad(bytes: &[u8], pad: u8) -> Vec<u8> {
    match bytes.first() {
        Some(first) if first & 0x80 != 0 => {
            let mut padded = Vec::with_capacity(bytes.len() + 1);
            padded.push(pad);
            padded.extend_from_slice(bytes);
            padded
        }
        _ => bytes.to_vec(),
    }
}

/// Prefix a hex string with `pad` when it has an odd number of digits.
///
/// The server is allowed to send `SRP_B` and `SALT` with the high nibble
/// stripped.
pub(crate) fn left_pad_to_even_length(hex: &str, pad: char) -> String {
    if hex.len() % 2 == 0 {
        hex.to_string()
    } else {
        format!("{pad}{hex}")
    }
}

/// `PAD(x)`: the minimal big-endian encoding of `x`, sign-safe.
pub(crate) fn pad_uint(value: &BigUint) -> Vec<u8> {
    left_pad(&value.to_bytes_be(), 0)
}

/// Sample the ephemeral secret `a`.
///
/// Resamples until the public value `A = g^a mod N` is a non-zero group
/// element, as mandated by SRP-6a.
pub(crate) fn generate_a<R: RngCore>(rng: &mut R) -> Vec<u8> {
    loop {
        let mut bytes = vec![0u8; EPHEMERAL_BYTES];
        rng.fill_bytes(&mut bytes);

        if G.modpow(&BigUint::from_bytes_be(&bytes), &N) != BigUint::from(0u32) {
            return bytes;
        }
    }
}

/// Compute the **public** `A` value for the ephemeral secret `a`.
pub(crate) fn compute_pub_a(a: &[u8]) -> Vec<u8> {
    pad_uint(&G.modpow(&BigUint::from_bytes_be(a), &N))
}

/// Normalise the server's raw `B` bytes into the padded form hashed into `u`.
pub(crate) fn compute_pub_b(b: &[u8]) -> Vec<u8> {
    pad_uint(&BigUint::from_bytes_be(b))
}

/// Compute the scrambling parameter `u = H(PAD(A) | PAD(B))`.
pub(crate) fn compute_u<D: Digest>(a_pub: &[u8], b_pub: &[u8]) -> BigUint {
    let mut d = D::new();
    d.update(a_pub);
    d.update(b_pub);

    BigUint::from_bytes_be(&d.finalize())
}

/// Compute the private key `x = H(PAD(salt) | identity)`.
///
/// `identity` is the digest of the credential identity string, computed by the
/// caller (it differs between user and device authentication).
pub(crate) fn compute_x<D: Digest>(identity: &[u8], salt: &[u8]) -> BigUint {
    let mut d = D::new();
    d.update(pad_uint(&BigUint::from_bytes_be(salt)));
    d.update(identity);

    BigUint::from_bytes_be(&d.finalize())
}

/// Compute the multiplier parameter `k = H(PAD(N) | PAD(g))`.
pub(crate) fn compute_k<D: Digest>() -> BigUint {
    let mut d = D::new();
    d.update(pad_uint(&N));
    d.update(pad_uint(&G));

    BigUint::from_bytes_be(&d.finalize())
}

/// Compute the shared secret `S = (B - k * g^x) ^ (a + u * x) mod N`.
pub(crate) fn compute_s(a: &[u8], u: &BigUint, x: &BigUint, k: BigUint, b: &[u8]) -> BigInt {
    let n = BigInt::from(N.clone());

    let b_value = BigInt::from(BigUint::from_bytes_be(b));
    let g_mod_pow_x = BigInt::from(G.modpow(x, &N));

    // The subtraction can go negative; normalise into [0, N) before the
    // exponentiation so the magnitude bytes match the server's view.
    let base = (b_value - BigInt::from(k) * g_mod_pow_x) % &n;
    let base = (base + &n) % &n;

    let exponent = BigInt::from(BigUint::from_bytes_be(a) + u * x);

    base.modpow(&exponent, &n)
}

/// The info block for the second HKDF step: the info string followed by a
/// single `0x01` block counter.
pub(crate) fn generate_key_derive_data() -> Vec<u8> {
    let mut data = DERIVE_KEY_INFO.as_bytes().to_vec();
    data.push(1);

    data
}

/// Generate the random password recorded for a newly confirmed device.
pub(crate) fn generate_password<R: RngCore>(rng: &mut R) -> String {
    let mut bytes = [0u8; DEVICE_PASSWORD_BYTES];
    rng.fill_bytes(&mut bytes);

    BASE64.encode(bytes)
}

/// Generate the random salt hashed into a new device verifier, already in the
/// padded form sent to the server.
pub(crate) fn generate_salt<R: RngCore>(rng: &mut R) -> Vec<u8> {
    let mut bytes = [0u8; DEVICE_SALT_BYTES];
    rng.fill_bytes(&mut bytes);

    pad_uint(&BigUint::from_bytes_be(&bytes))
}

/// The current time in the exact form the server verifies inside the password
/// claim signature: `Www MMM D HH:MM:SS UTC YYYY`, C locale, single spaces,
/// no zero padding on the day of month.
pub(crate) fn get_timestamp() -> String {
    format_timestamp(&Utc::now())
}

pub(crate) fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%a %b %-d %H:%M:%S UTC %Y").to_string()
}
