//! RC4 stream cipher.
//!
//! Used by revisions 2-4 of the standard security handler, both for object
//! data and inside the O/U password computations.
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm

struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Key scheduling. PDF keys are 5 to 16 bytes; an empty key is treated as one zero byte.
    fn new(key: &[u8]) -> Self {
        let key: &[u8] = if key.is_empty() { &[0] } else { key };
        let mut s = [0u8; 256];
        for (i, v) in s.iter_mut().enumerate() {
            *v = i as u8;
        }
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        Self { s, i: 0, j: 0 }
    }

    fn apply(&mut self, data: &mut [u8]) {
        for byte in data {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *byte ^= self.s[k as usize];
        }
    }
}

/// Encrypt or decrypt `data` with RC4. The operation is its own inverse.
pub fn rc4_crypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    Rc4::new(key).apply(&mut out);
    out
}

/// Run RC4 20 times with the key XORed by `rounds` in order (Algorithms 3, 5 and 7).
pub fn rc4_rounds(key: &[u8], data: &[u8], rounds: impl Iterator<Item = u8>) -> Vec<u8> {
    let mut out = data.to_vec();
    let mut round_key = key.to_vec();
    for i in rounds {
        for (k, base) in round_key.iter_mut().zip(key) {
            *k = base ^ i;
        }
        Rc4::new(&round_key).apply(&mut out);
    }
    out
}
