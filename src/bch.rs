//! # BCH 纠错码模块
//!
//! 二进制 BCH 码，定义在 GF(2^m) 上，`3 <= m <= 16`，码长 `n = 2^m - 1`。
//!
//! 生成多项式 `g(x)` 是 α^1 … α^(2t) 的极小多项式的最小公倍式。编码为系统码，
//! 码字按多项式系数从低到高排列为 `[校验位 | 数据位]`：
//! `c(x) = x^(n-k)·d(x) + (x^(n-k)·d(x) mod g(x))`。
//! 数据较短时在数据位末尾补零 (缩短码)，这些补零位无需传输。
//!
//! 解码使用 Berlekamp-Massey 求错误位置多项式，再用 Chien 搜索求根。
//! 错误数不超过 `t` 时保证纠正并返回准确的错误数；超过 `t` 时不保证能检测到。

use thiserror::Error;

/// 各阶数 m 对应的本原多项式，下标为 m。
const PRIMITIVE_POLYS: [u32; 17] = [
    0, 0, 0, 0x0B, 0x13, 0x25, 0x43, 0x89, 0x11D, 0x211, 0x409, 0x805, 0x1053, 0x201B, 0x4443,
    0x8003, 0x1100B,
];

const MIN_ORDER: u32 = 3;
const MAX_ORDER: u32 = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BchError {
    #[error("no BCH code up to length {max} can hold {data_bits} data bits while correcting {errors} errors")]
    Unsupported {
        data_bits: usize,
        errors: usize,
        max: usize,
    },

    #[error("{0} is not a valid BCH code length (must be 2^m - 1 with 3 <= m <= 16)")]
    InvalidLength(usize),

    #[error("a BCH code of length {length} cannot correct {errors} errors")]
    TooManyErrors { length: usize, errors: usize },

    #[error("expected {expected} bits, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// 错误超出纠错能力。携带未经纠正的原始数据位。
    #[error("the codeword has more errors than the code can correct")]
    Uncorrectable { raw_data: Vec<u8> },
}

/// 满足 `data_bits` 数据位并能纠正 `max_errors` 个错误的最短码长。
///
/// # Errors
///
/// 当 m = 16 的码也无法满足要求时返回 `BchError::Unsupported`。
pub fn total_bits_for_config(data_bits: usize, max_errors: usize) -> Result<usize, BchError> {
    for m in MIN_ORDER..=MAX_ORDER {
        let n = (1usize << m) - 1;
        if 2 * max_errors >= n {
            continue;
        }
        let degree: usize = coset_leaders(n, max_errors)
            .iter()
            .map(|&leader| cyclotomic_coset(leader, n).len())
            .sum();
        if degree < n && n - degree >= data_bits {
            return Ok(n);
        }
    }
    Err(BchError::Unsupported {
        data_bits,
        errors: max_errors,
        max: (1usize << MAX_ORDER) - 1,
    })
}

/// 奇数 i (1 <= i < 2t) 所在分圆陪集的代表元，去重。偶数次幂与 i/2 同属一个陪集。
fn coset_leaders(n: usize, max_errors: usize) -> Vec<usize> {
    let mut covered = vec![false; n];
    let mut leaders = Vec::new();
    for i in (1..2 * max_errors).step_by(2) {
        let r = i % n;
        if covered[r] {
            continue;
        }
        for j in cyclotomic_coset(r, n) {
            covered[j] = true;
        }
        leaders.push(r);
    }
    leaders
}

fn cyclotomic_coset(leader: usize, n: usize) -> Vec<usize> {
    let mut coset = vec![leader];
    let mut j = (leader * 2) % n;
    while j != leader {
        coset.push(j);
        j = (j * 2) % n;
    }
    coset
}

/// GF(2^m) 的对数/指数表。
#[derive(Debug, Clone)]
struct GaloisField {
    n: usize,
    exp: Vec<u16>,
    log: Vec<u16>,
}

impl GaloisField {
    fn new(m: u32) -> Self {
        let n = (1usize << m) - 1;
        let poly = PRIMITIVE_POLYS[m as usize];
        let mut exp = vec![0u16; 2 * n];
        let mut log = vec![0u16; n + 1];
        let mut x: u32 = 1;
        for i in 0..n {
            exp[i] = x as u16;
            exp[i + n] = x as u16;
            log[x as usize] = i as u16;
            x <<= 1;
            if x & (1 << m) != 0 {
                x ^= poly;
            }
        }
        Self { n, exp, log }
    }

    /// α^e
    fn alpha_pow(&self, e: usize) -> u16 {
        self.exp[e % self.n]
    }

    fn mul(&self, a: u16, b: u16) -> u16 {
        if a == 0 || b == 0 {
            return 0;
        }
        self.exp[self.log[a as usize] as usize + self.log[b as usize] as usize]
    }

    fn div(&self, a: u16, b: u16) -> u16 {
        if a == 0 {
            return 0;
        }
        let e = self.log[a as usize] as usize + self.n - self.log[b as usize] as usize;
        self.exp[e % self.n]
    }
}

/// 一组固定的 BCH 参数及其生成多项式。
#[derive(Debug, Clone)]
pub struct BchCode {
    field: GaloisField,
    max_errors: usize,
    /// GF(2) 系数，低次在前。
    generator: Vec<u8>,
}

impl BchCode {
    /// 为码长 `code_length` 与纠错能力 `max_errors` 构造编码器。
    ///
    /// # Errors
    ///
    /// 码长不是 `2^m - 1`，或 `2t` 不小于码长时返回错误。
    pub fn new(code_length: usize, max_errors: usize) -> Result<Self, BchError> {
        let m = (code_length + 1).trailing_zeros();
        if !(code_length + 1).is_power_of_two() || !(MIN_ORDER..=MAX_ORDER).contains(&m) {
            return Err(BchError::InvalidLength(code_length));
        }
        if max_errors == 0 || 2 * max_errors >= code_length {
            return Err(BchError::TooManyErrors {
                length: code_length,
                errors: max_errors,
            });
        }

        let field = GaloisField::new(m);
        let mut generator = vec![1u8];
        for leader in coset_leaders(field.n, max_errors) {
            let minimal = minimal_polynomial(&field, leader);
            generator = gf2_mul(&generator, &minimal);
        }
        if generator.len() > code_length {
            return Err(BchError::TooManyErrors {
                length: code_length,
                errors: max_errors,
            });
        }

        Ok(Self {
            field,
            max_errors,
            generator,
        })
    }

    pub fn code_length(&self) -> usize {
        self.field.n
    }

    pub fn max_correctable_errors(&self) -> usize {
        self.max_errors
    }

    /// 校验位数量，即生成多项式的次数。
    pub fn checksum_bits(&self) -> usize {
        self.generator.len() - 1
    }

    /// 每个码字可携带的数据位数量。
    pub fn storage_bits(&self) -> usize {
        self.code_length() - self.checksum_bits()
    }

    /// 可纠正错误数与码长之比。
    pub fn ecc_ratio(&self) -> f64 {
        self.max_errors as f64 / self.code_length() as f64
    }

    /// 系统编码，输入恰好 `storage_bits` 个数据位 (0/1)。
    ///
    /// # Errors
    ///
    /// 数据位数量不符时返回 `BchError::LengthMismatch`。
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>, BchError> {
        if data.len() != self.storage_bits() {
            return Err(BchError::LengthMismatch {
                expected: self.storage_bits(),
                actual: data.len(),
            });
        }
        let parity_len = self.checksum_bits();
        let mut remainder = vec![0u8; self.code_length()];
        remainder[parity_len..].copy_from_slice(data);
        for i in (parity_len..self.code_length()).rev() {
            if remainder[i] & 1 == 1 {
                let shift = i - parity_len;
                for (k, &g) in self.generator.iter().enumerate() {
                    remainder[shift + k] ^= g;
                }
            }
        }

        let mut codeword = Vec::with_capacity(self.code_length());
        codeword.extend_from_slice(&remainder[..parity_len]);
        codeword.extend_from_slice(data);
        Ok(codeword)
    }

    /// 解码完整长度的码字，返回纠正后的数据位与纠正的错误数。
    ///
    /// `transmitted` 之后的位是缩短码中从未传输、已知为 0 的补零位；
    /// 若纠错结果落在这些位置上，说明错误已超出纠错能力。
    ///
    /// # Errors
    ///
    /// * 码字长度不符时返回 `BchError::LengthMismatch`。
    /// * 错误超出纠错能力且被检测到时返回 `BchError::Uncorrectable`。
    pub fn decode(&self, codeword: &[u8], transmitted: usize) -> Result<(Vec<u8>, usize), BchError> {
        let n = self.code_length();
        if codeword.len() != n {
            return Err(BchError::LengthMismatch {
                expected: n,
                actual: codeword.len(),
            });
        }
        let parity_len = self.checksum_bits();
        let syndromes = self.syndromes(codeword);
        if syndromes.iter().all(|&s| s == 0) {
            return Ok((codeword[parity_len..].to_vec(), 0));
        }

        let uncorrectable = || BchError::Uncorrectable {
            raw_data: codeword[parity_len..].to_vec(),
        };

        let locator = self.berlekamp_massey(&syndromes);
        let degree = locator.len() - 1;
        if degree == 0 || degree > self.max_errors {
            return Err(uncorrectable());
        }

        let positions = self.chien_search(&locator);
        if positions.len() != degree || positions.iter().any(|&p| p >= transmitted) {
            return Err(uncorrectable());
        }

        let mut corrected = codeword.to_vec();
        for &p in &positions {
            corrected[p] ^= 1;
        }
        Ok((corrected[parity_len..].to_vec(), degree))
    }

    /// S_j = r(α^j)，j = 1..=2t。
    fn syndromes(&self, received: &[u8]) -> Vec<u16> {
        let mut syndromes = vec![0u16; 2 * self.max_errors];
        for (i, _) in received.iter().enumerate().filter(|&(_, &bit)| bit & 1 == 1) {
            for (j, s) in syndromes.iter_mut().enumerate() {
                *s ^= self.field.alpha_pow(i * (j + 1));
            }
        }
        syndromes
    }

    /// 返回错误位置多项式 σ(x)，低次在前，末尾无多余零系数。
    fn berlekamp_massey(&self, syndromes: &[u16]) -> Vec<u16> {
        let f = &self.field;
        let mut current = vec![1u16];
        let mut previous = vec![1u16];
        let mut length = 0usize;
        let mut gap = 1usize;
        let mut last_discrepancy = 1u16;

        for k in 0..syndromes.len() {
            let mut discrepancy = syndromes[k];
            for i in 1..=length.min(current.len() - 1) {
                discrepancy ^= f.mul(current[i], syndromes[k - i]);
            }
            if discrepancy == 0 {
                gap += 1;
                continue;
            }

            let scale = f.div(discrepancy, last_discrepancy);
            let mut next = current.clone();
            if next.len() < previous.len() + gap {
                next.resize(previous.len() + gap, 0);
            }
            for (i, &b) in previous.iter().enumerate() {
                next[i + gap] ^= f.mul(scale, b);
            }

            if 2 * length <= k {
                length = k + 1 - length;
                previous = current;
                last_discrepancy = discrepancy;
                gap = 1;
            } else {
                gap += 1;
            }
            current = next;
        }

        while current.len() > 1 && current.last() == Some(&0) {
            current.pop();
        }
        current
    }

    /// 错误位置 i 满足 σ(α^-i) = 0。
    fn chien_search(&self, locator: &[u16]) -> Vec<usize> {
        let f = &self.field;
        let n = f.n;
        (0..n)
            .filter(|&i| {
                let x = f.alpha_pow((n - i) % n);
                let mut value = 0u16;
                let mut power = 1u16;
                for &coefficient in locator {
                    value ^= f.mul(coefficient, power);
                    power = f.mul(power, x);
                }
                value == 0
            })
            .collect()
    }
}

/// 以 α^leader 为根的极小多项式，结果系数均在 GF(2) 中。
fn minimal_polynomial(field: &GaloisField, leader: usize) -> Vec<u8> {
    let mut poly = vec![1u16];
    for j in cyclotomic_coset(leader, field.n) {
        let root = field.alpha_pow(j);
        let mut next = vec![0u16; poly.len() + 1];
        for (i, &c) in poly.iter().enumerate() {
            next[i + 1] ^= c;
            next[i] ^= field.mul(c, root);
        }
        poly = next;
    }
    poly.into_iter().map(|c| (c & 1) as u8).collect()
}

fn gf2_mul(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0 {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            out[i + j] ^= y;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::index::sample;
    use rand::{Rng, SeedableRng};

    fn random_bits(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| rng.random_range(0..2u8)).collect()
    }

    #[test]
    fn picks_the_shortest_fitting_code() {
        // m = 9: n = 511, 每个错误占 9 个校验位
        assert_eq!(total_bits_for_config(256, 1).unwrap(), 511);
        assert_eq!(total_bits_for_config(256, 28).unwrap(), 511);
        assert_eq!(total_bits_for_config(256, 29).unwrap(), 1023);
        assert_eq!(total_bits_for_config(4, 1).unwrap(), 7);
    }

    #[test]
    fn known_small_code_parameters() {
        // BCH(15, 7) 纠正 2 个错误，BCH(15, 5) 纠正 3 个错误
        let code = BchCode::new(15, 2).unwrap();
        assert_eq!((code.storage_bits(), code.checksum_bits()), (7, 8));
        let code = BchCode::new(15, 3).unwrap();
        assert_eq!((code.storage_bits(), code.checksum_bits()), (5, 10));
        let code = BchCode::new(511, 4).unwrap();
        assert_eq!(code.checksum_bits(), 36);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(BchCode::new(100, 2).unwrap_err(), BchError::InvalidLength(100));
        assert!(matches!(BchCode::new(7, 4), Err(BchError::TooManyErrors { .. })));
        assert!(matches!(total_bits_for_config(1 << 17, 1), Err(BchError::Unsupported { .. })));
    }

    #[test]
    fn encode_is_systematic_and_clean_decode_reports_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let code = BchCode::new(511, 5).unwrap();
        let data = random_bits(&mut rng, code.storage_bits());
        let codeword = code.encode(&data).unwrap();
        assert_eq!(codeword.len(), 511);
        assert_eq!(&codeword[code.checksum_bits()..], &data[..]);

        let (decoded, errors) = code.decode(&codeword, 511).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(errors, 0);
    }

    #[test]
    fn corrects_up_to_t_errors_with_exact_count() {
        let mut rng = StdRng::seed_from_u64(2);
        let code = BchCode::new(511, 6).unwrap();
        for flips in 1..=6 {
            let data = random_bits(&mut rng, code.storage_bits());
            let mut codeword = code.encode(&data).unwrap();
            for p in sample(&mut rng, 511, flips).into_iter() {
                codeword[p] ^= 1;
            }
            let (decoded, errors) = code.decode(&codeword, 511).unwrap();
            assert_eq!(decoded, data);
            assert_eq!(errors, flips);
        }
    }

    #[test]
    fn corrections_in_untransmitted_padding_are_refused() {
        let code = BchCode::new(15, 2).unwrap();
        let data = vec![1, 0, 1, 0, 0, 0, 0];
        let mut codeword = code.encode(&data).unwrap();
        codeword[14] ^= 1;
        assert!(code.decode(&codeword, 15).is_ok());
        assert!(matches!(
            code.decode(&codeword, 11),
            Err(BchError::Uncorrectable { .. })
        ));
    }

    #[test]
    fn one_error_too_many_never_yields_the_original_data() {
        let mut rng = StdRng::seed_from_u64(3);
        let code = BchCode::new(511, 3).unwrap();
        let parity = code.checksum_bits();
        for _ in 0..20 {
            let data = random_bits(&mut rng, code.storage_bits());
            let mut codeword = code.encode(&data).unwrap();
            for p in sample(&mut rng, code.storage_bits(), 4).into_iter() {
                codeword[parity + p] ^= 1;
            }
            let recovered = match code.decode(&codeword, 511) {
                Ok((bits, _)) => bits,
                Err(BchError::Uncorrectable { raw_data }) => raw_data,
                Err(other) => panic!("unexpected error: {other}"),
            };
            assert_ne!(recovered, data);
        }
    }
}
