//! Elementwise and matrix primitives over Z_{2^k}
//!
//! All kernels run on u128 words masked to the ring width. Elementwise work
//! is data parallel: inputs are read-only, outputs are written to disjoint
//! slices, so large tensors fan out across the rayon pool while small ones
//! stay on the caller thread.

use super::{RingField, Tensor};
use crate::{MpcError, Result};
use rayon::prelude::*;

/// 低于该元素数时留在调用线程上执行
const PAR_THRESHOLD: usize = 4096;

#[inline]
fn ensure_binary_compat(x: &Tensor, y: &Tensor) -> Result<()> {
    if x.field() != y.field() {
        return Err(MpcError::TypeMismatch(format!(
            "operands live in different rings: {:?} vs {:?}",
            x.field(),
            y.field()
        )));
    }
    if x.shape() != y.shape() {
        return Err(MpcError::ShapeMismatch(format!(
            "operand shapes differ: {:?} vs {:?}",
            x.shape(),
            y.shape()
        )));
    }
    Ok(())
}

/// 逐元素一元运算，保持输入的元素类型标签
pub fn unary_map<F>(x: &Tensor, f: F) -> Tensor
where
    F: Fn(u128) -> u128 + Sync + Send,
{
    let field = x.field();
    let src = x.words();
    let out: Vec<u128> = if src.len() >= PAR_THRESHOLD {
        src.par_iter().map(|&w| field.mask(f(w))).collect()
    } else {
        src.iter().map(|&w| field.mask(f(w))).collect()
    };
    Tensor::from_raw(x.ty(), x.shape().to_vec(), out)
}

/// 逐元素二元运算，保持左操作数的元素类型标签
pub fn binary_map<F>(x: &Tensor, y: &Tensor, f: F) -> Result<Tensor>
where
    F: Fn(u128, u128) -> u128 + Sync + Send,
{
    ensure_binary_compat(x, y)?;
    let field = x.field();
    let (a, b) = (x.words(), y.words());
    let out: Vec<u128> = if a.len() >= PAR_THRESHOLD {
        a.par_iter()
            .zip(b.par_iter())
            .map(|(&u, &v)| field.mask(f(u, v)))
            .collect()
    } else {
        a.iter()
            .zip(b.iter())
            .map(|(&u, &v)| field.mask(f(u, v)))
            .collect()
    };
    Ok(Tensor::from_raw(x.ty(), x.shape().to_vec(), out))
}

pub fn add(x: &Tensor, y: &Tensor) -> Result<Tensor> {
    binary_map(x, y, |u, v| u.wrapping_add(v))
}

pub fn sub(x: &Tensor, y: &Tensor) -> Result<Tensor> {
    binary_map(x, y, |u, v| u.wrapping_sub(v))
}

pub fn mul(x: &Tensor, y: &Tensor) -> Result<Tensor> {
    binary_map(x, y, |u, v| u.wrapping_mul(v))
}

pub fn neg(x: &Tensor) -> Tensor {
    unary_map(x, |u| u.wrapping_neg())
}

pub fn add_scalar(x: &Tensor, s: u128) -> Tensor {
    unary_map(x, move |u| u.wrapping_add(s))
}

pub fn sub_scalar(x: &Tensor, s: u128) -> Tensor {
    unary_map(x, move |u| u.wrapping_sub(s))
}

pub fn mul_scalar(x: &Tensor, s: u128) -> Tensor {
    unary_map(x, move |u| u.wrapping_mul(s))
}

/// 单个字的算术右移（按 k 位二进制补码语义做符号扩展）
#[inline]
pub fn arshift_word(field: RingField, v: u128, m: u32) -> u128 {
    if m == 0 {
        return field.mask(v);
    }
    let k = field.bits();
    let extended = if k == 128 {
        v
    } else if (v >> (k - 1)) & 1 == 1 {
        v | !field.mask(u128::MAX)
    } else {
        v
    };
    field.mask(((extended as i128) >> m.min(127)) as u128)
}

/// 逐元素逻辑左移
pub fn lshift(x: &Tensor, m: u32) -> Tensor {
    if m >= 128 {
        return Tensor::zeros(x.ty(), x.shape());
    }
    unary_map(x, move |u| u << m)
}

/// 逐元素逻辑右移
pub fn rshift(x: &Tensor, m: u32) -> Tensor {
    if m >= 128 {
        return Tensor::zeros(x.ty(), x.shape());
    }
    unary_map(x, move |u| u >> m)
}

/// 逐元素算术右移
pub fn arshift(x: &Tensor, m: u32) -> Tensor {
    let field = x.field();
    unary_map(x, move |u| arshift_word(field, u, m))
}

/// 逐元素按位移位，移位量向量长度为 1（广播）或与元素数一致
pub fn lshift_vec(x: &Tensor, bits: &[u32]) -> Result<Tensor> {
    match bits.len() {
        1 => Ok(lshift(x, bits[0])),
        n if n == x.numel() => {
            let field = x.field();
            let out: Vec<u128> = x
                .words()
                .iter()
                .zip(bits.iter())
                .map(|(&w, &m)| if m >= 128 { 0 } else { field.mask(w << m) })
                .collect();
            Ok(Tensor::from_raw(x.ty(), x.shape().to_vec(), out))
        }
        _ => Err(MpcError::ShapeMismatch(format!(
            "shift vector of length {} does not match {} elements",
            bits.len(),
            x.numel()
        ))),
    }
}

/// 保留低 m 位
pub fn bit_and_mask(x: &Tensor, m: u32) -> Tensor {
    if m >= 128 {
        return x.clone();
    }
    let keep = (1u128 << m) - 1;
    unary_map(x, move |u| u & keep)
}

/// 每个元素的最高位 (0/1)
pub fn msb(x: &Tensor) -> Tensor {
    let shift = x.field().bits() - 1;
    unary_map(x, move |u| (u >> shift) & 1)
}

/// 矩阵乘法：x 为 [m, k]，y 为 [k, n]，结果 [m, n]，保持 x 的类型标签
pub fn matmul(x: &Tensor, y: &Tensor) -> Result<Tensor> {
    if x.field() != y.field() {
        return Err(MpcError::TypeMismatch(format!(
            "matmul operands live in different rings: {:?} vs {:?}",
            x.field(),
            y.field()
        )));
    }
    let (xs, ys) = (x.shape(), y.shape());
    if xs.len() != 2 || ys.len() != 2 || xs[1] != ys[0] {
        return Err(MpcError::ShapeMismatch(format!(
            "matmul shapes incompatible: {:?} x {:?}",
            xs, ys
        )));
    }
    let (m, kk, n) = (xs[0], xs[1], ys[1]);
    let field = x.field();
    let (a, b) = (x.words(), y.words());
    let mut out = vec![0u128; m * n];

    let row_job = |row: usize, dst: &mut [u128]| {
        for j in 0..n {
            let mut acc = 0u128;
            for l in 0..kk {
                acc = acc.wrapping_add(a[row * kk + l].wrapping_mul(b[l * n + j]));
            }
            dst[j] = field.mask(acc);
        }
    };

    if m * n >= PAR_THRESHOLD {
        out.par_chunks_mut(n)
            .enumerate()
            .for_each(|(row, dst)| row_job(row, dst));
    } else {
        for (row, dst) in out.chunks_mut(n).enumerate() {
            row_job(row, dst);
        }
    }
    Ok(Tensor::from_raw(x.ty(), vec![m, n], out))
}
