//! Time-based one-time passwords (RFC 6238) over HMAC-SHA-256.
//!
//! Secrets are 20 random bytes shown base32 (RFC 4648, unpadded) so any
//! authenticator app can enroll them from the otpauth URI. Verification
//! accepts one step of clock skew either side.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

pub const DIGITS: usize = 6;
pub const STEP_SECONDS: i64 = 30;
const SKEW_STEPS: i64 = 1;
const SECRET_BYTES: usize = 20;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

type HmacSha256 = Hmac<Sha256>;

pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base32_encode(&bytes)
}

pub fn otpauth_uri(issuer: &str, account: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}\
         &algorithm=SHA256&digits={DIGITS}&period={STEP_SECONDS}"
    )
}

/// Checks a submitted code against a base32 secret at the given unix time.
pub fn verify(secret_base32: &str, code: &str, now_unix: i64) -> bool {
    let Some(key) = base32_decode(secret_base32) else {
        return false;
    };
    let code = code.trim();
    if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let step = now_unix / STEP_SECONDS;
    for offset in -SKEW_STEPS..=SKEW_STEPS {
        let candidate = step + offset;
        if candidate < 0 {
            continue;
        }
        if hotp(&key, candidate as u64) == code {
            return true;
        }
    }
    false
}

/// Current code for a secret. Enrollment confirmation flows and tests need
/// to produce codes, not only check them.
pub fn code_at(secret_base32: &str, now_unix: i64) -> Option<String> {
    let key = base32_decode(secret_base32)?;
    let step = now_unix / STEP_SECONDS;
    if step < 0 {
        return None;
    }
    Some(hotp(&key, step as u64))
}

fn hotp(key: &[u8], counter: u64) -> String {
    // HMAC accepts any key length; the error arm is unreachable.
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return String::new();
    };
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    format!("{:06}", binary % 1_000_000)
}

pub fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

pub fn base32_decode(text: &str) -> Option<Vec<u8>> {
    let trimmed = text.trim();
    let mut out = Vec::with_capacity(trimmed.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    for ch in trimmed.chars() {
        if ch == '=' {
            continue;
        }
        let upper = ch.to_ascii_uppercase() as u8;
        let value = BASE32_ALPHABET.iter().position(|&a| a == upper)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    Some(out)
}
