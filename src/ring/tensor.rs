//! Typed N-dimensional ring tensors
//!
//! A tensor couples a shape, an element type tag and a reference-counted
//! buffer of u128 words. The kernel treats tensors as immutable; tag
//! transitions never copy the backing buffer.

use super::RingField;
use crate::{MpcError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 元素类型：同一缓冲区上的语义标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    /// 公开值，所有参与方一致
    Public(RingField),
    /// 仅 owner 方持有明文，其余方为占位值
    Private(RingField, usize),
    /// 加法算术份额
    Arith(RingField),
    /// 单比特布尔份额（字的高位可能是垃圾）
    Bool(RingField),
    /// 未标记的环元素，仅作中间值
    Ring(RingField),
}

impl ElementType {
    #[inline]
    pub fn field(&self) -> RingField {
        match self {
            ElementType::Public(f)
            | ElementType::Private(f, _)
            | ElementType::Arith(f)
            | ElementType::Bool(f)
            | ElementType::Ring(f) => *f,
        }
    }

    /// Priv(owner) 的持有方，其余类型返回 None
    pub fn owner(&self) -> Option<usize> {
        match self {
            ElementType::Private(_, owner) => Some(*owner),
            _ => None,
        }
    }
}

/// 环上的类型化张量
///
/// 缓冲区是引用计数的，`as_type` 重打标签时与原张量共享同一缓冲区；
/// 缓冲区地址因此可以充当 Beaver 缓存的稳定键。
#[derive(Debug, Clone)]
pub struct Tensor {
    ty: ElementType,
    shape: Vec<usize>,
    buf: Arc<Vec<u128>>,
}

impl Tensor {
    /// 从字向量构造张量，所有字都会按环宽度掩码
    pub fn from_words(ty: ElementType, shape: &[usize], words: Vec<u128>) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        if words.len() != numel {
            return Err(MpcError::ShapeMismatch(format!(
                "buffer holds {} words but shape {:?} needs {}",
                words.len(),
                shape,
                numel
            )));
        }
        let field = ty.field();
        let words = words.into_iter().map(|w| field.mask(w)).collect();
        Ok(Tensor {
            ty,
            shape: shape.to_vec(),
            buf: Arc::new(words),
        })
    }

    /// 标量广播构造公开张量
    pub fn from_scalar(field: RingField, shape: &[usize], value: u128) -> Tensor {
        let numel: usize = shape.iter().product();
        Tensor {
            ty: ElementType::Public(field),
            shape: shape.to_vec(),
            buf: Arc::new(vec![field.mask(value); numel]),
        }
    }

    /// 全零张量
    pub fn zeros(ty: ElementType, shape: &[usize]) -> Tensor {
        let numel: usize = shape.iter().product();
        Tensor {
            ty,
            shape: shape.to_vec(),
            buf: Arc::new(vec![0u128; numel]),
        }
    }

    /// 从小端字节缓冲区解析张量
    ///
    /// Beaver 提供者按 `numel × sizeof(field)` 字节返回扁平缓冲区；
    /// 长度不符视为提供者违约。
    pub fn from_le_bytes(ty: ElementType, shape: &[usize], bytes: &[u8]) -> Result<Tensor> {
        let field = ty.field();
        let numel: usize = shape.iter().product();
        let elem = field.bytes();
        if bytes.len() != numel * elem {
            return Err(MpcError::ProviderViolation(format!(
                "buffer is {} bytes, expected {} ({} elements of {} bytes)",
                bytes.len(),
                numel * elem,
                numel,
                elem
            )));
        }
        let mut words = Vec::with_capacity(numel);
        for chunk in bytes.chunks_exact(elem) {
            let mut w = [0u8; 16];
            w[..elem].copy_from_slice(chunk);
            words.push(u128::from_le_bytes(w));
        }
        Ok(Tensor {
            ty,
            shape: shape.to_vec(),
            buf: Arc::new(words),
        })
    }

    /// 序列化为小端字节缓冲区（每元素 sizeof(field) 字节）
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let elem = self.field().bytes();
        let mut bytes = Vec::with_capacity(self.numel() * elem);
        for &w in self.buf.iter() {
            bytes.extend_from_slice(&w.to_le_bytes()[..elem]);
        }
        bytes
    }

    #[inline]
    pub fn ty(&self) -> ElementType {
        self.ty
    }

    #[inline]
    pub fn field(&self) -> RingField {
        self.ty.field()
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    #[inline]
    pub fn words(&self) -> &[u128] {
        &self.buf
    }

    /// 稳定的缓冲区标识，Beaver 缓存以此为键
    #[inline]
    pub fn buffer_id(&self) -> usize {
        Arc::as_ptr(&self.buf) as *const u128 as usize
    }

    /// 更换元素类型标签，不复制缓冲区
    ///
    /// 仅在环域一致时允许；跨环转换必须经过显式协议。
    pub fn as_type(&self, ty: ElementType) -> Result<Tensor> {
        if ty.field() != self.field() {
            return Err(MpcError::TypeMismatch(format!(
                "cannot retag {:?} tensor as {:?} without a ring conversion",
                self.ty, ty
            )));
        }
        Ok(Tensor {
            ty,
            shape: self.shape.clone(),
            buf: Arc::clone(&self.buf),
        })
    }

    /// 以新形状查看同一缓冲区（元素个数必须一致）
    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        if numel != self.numel() {
            return Err(MpcError::ShapeMismatch(format!(
                "cannot reshape {:?} into {:?}",
                self.shape, shape
            )));
        }
        Ok(Tensor {
            ty: self.ty,
            shape: shape.to_vec(),
            buf: Arc::clone(&self.buf),
        })
    }

    pub(crate) fn from_raw(ty: ElementType, shape: Vec<usize>, words: Vec<u128>) -> Tensor {
        Tensor {
            ty,
            shape,
            buf: Arc::new(words),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retag_shares_buffer() {
        let t = Tensor::from_scalar(RingField::F64, &[4], 9);
        let r = t.as_type(ElementType::Arith(RingField::F64)).unwrap();
        assert_eq!(t.buffer_id(), r.buffer_id());
        assert_eq!(r.ty(), ElementType::Arith(RingField::F64));
    }

    #[test]
    fn retag_rejects_field_change() {
        let t = Tensor::from_scalar(RingField::F64, &[4], 9);
        assert!(t.as_type(ElementType::Arith(RingField::F32)).is_err());
    }

    #[test]
    fn le_bytes_round_trip() {
        let t = Tensor::from_words(
            ElementType::Ring(RingField::F32),
            &[3],
            vec![1, 0xFFFF_FFFF, 7],
        )
        .unwrap();
        let bytes = t.to_le_bytes();
        assert_eq!(bytes.len(), 12);
        let back = Tensor::from_le_bytes(ElementType::Ring(RingField::F32), &[3], &bytes).unwrap();
        assert_eq!(back.words(), t.words());
    }

    #[test]
    fn short_byte_buffer_is_provider_violation() {
        let err = Tensor::from_le_bytes(ElementType::Ring(RingField::F64), &[2], &[0u8; 9])
            .unwrap_err();
        assert!(matches!(err, MpcError::ProviderViolation(_)));
    }
}
