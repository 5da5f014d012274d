//! Beaver-triple multiplication family
//!
//! MulAA, SquareA and MatMulAA share one masked-open subroutine: fetch a
//! triple shaped to the operands, open x−a and y−b, then recombine
//! locally. The open-value cache hooks in here: a cached operand passes
//! its replay descriptor to the provider (which regenerates the same mask)
//! and skips the open round entirely.
//!
//! MulA1B multiplies an arithmetic share by a one-bit boolean share by
//! de-biasing a plain Beaver product; MulVVS multiplies two single-owner
//! private values over one exchange of masked inputs.

use super::{
    expect_arith, expect_bool, expect_private, expect_same_field, expect_same_shape, Evaluator,
};
use crate::beaver::CacheQuery;
use crate::ring::{ops, ElementType, Tensor};
use crate::{MpcError, Result};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MulMode {
    Elementwise,
    MatMul,
}

impl Evaluator {
    /// MulAA: 算术份额相乘
    pub fn mul_aa(&mut self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        expect_arith(x)?;
        expect_arith(y)?;
        expect_same_field(x, y)?;
        expect_same_shape(x, y)?;
        self.beaver_mul(x, y, MulMode::Elementwise)
    }

    /// MatMulAA: 份额矩阵 [m,k] 乘份额矩阵 [k,n]
    pub fn matmul_aa(&mut self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        expect_arith(x)?;
        expect_arith(y)?;
        expect_same_field(x, y)?;
        if x.shape().len() != 2 || y.shape().len() != 2 || x.shape()[1] != y.shape()[0] {
            return Err(MpcError::ShapeMismatch(format!(
                "matmul shapes incompatible: {:?} x {:?}",
                x.shape(),
                y.shape()
            )));
        }
        self.beaver_mul(x, y, MulMode::MatMul)
    }

    /// SquareA: 份额平方，使用平方对 (a, a²)，只需一次打开
    pub fn square_a(&mut self, x: &Tensor) -> Result<Tensor> {
        let field = expect_arith(x)?;
        let numel = x.numel();
        let query = self.cache().get(x, false);
        let replay = query.hit.as_ref().map(|h| h.replay);
        let pair = self.provider_mut().square(field, numel, replay)?;
        let ring = ElementType::Ring(field);
        let a = Tensor::from_le_bytes(ring, x.shape(), &pair.a)?;
        let sq = Tensor::from_le_bytes(ring, x.shape(), &pair.sq)?;

        let ex = match query.hit {
            Some(hit) => hit.opened,
            None => {
                let opened = self
                    .comm()
                    .all_reduce_sum(&ops::sub(x, &a)?, "open(x-a)")?
                    .as_type(ring)?;
                if query.enabled {
                    self.cache_mut().set(x, false, pair.desc_a, opened.clone());
                }
                opened
            }
        };

        // z_i = a²_i + 2·(x−a)·a_i，0 号方再加 (x−a)²
        let mut z = ops::add(&sq, &ops::mul_scalar(&ops::mul(&ex, &a)?, 2))?;
        if self.rank() == 0 {
            z = ops::add(&z, &ops::mul(&ex, &ex)?)?;
        }
        z.as_type(ElementType::Arith(field))
    }

    /// MulA1B: 算术份额乘单比特布尔份额（两方）
    ///
    /// 布尔份额的字在 bit 0 之上可能是垃圾，使用前先掩到 1 位。
    pub fn mul_a1b(&mut self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        let field = expect_arith(x)?;
        expect_bool(y)?;
        expect_same_field(x, y)?;
        expect_same_shape(x, y)?;
        if self.world_size() != 2 {
            return Err(MpcError::InvalidParameter(format!(
                "MulA1B de-biasing is two-party only, world is {}",
                self.world_size()
            )));
        }

        let yy = ops::bit_and_mask(y, 1).as_type(ElementType::Arith(field))?;
        // xx_i = (1 − 2·y_i)·x_i
        let sign = ops::unary_map(&yy, |b| 1u128.wrapping_sub(b.wrapping_mul(2)));
        let xx = ops::mul(&sign, x)?.as_type(ElementType::Arith(field))?;

        let product = self.beaver_mul(&xx, &yy, MulMode::Elementwise)?;
        // Σᵢ 修正 −xx_i·yy_i + x_i·y_i 把 Beaver 积 (Σxx)(Σyy) 拉回 x·(y₀⊕y₁)
        let corr = ops::sub(&ops::mul(x, &yy)?, &ops::mul(&xx, &yy)?)?;
        ops::add(&product, &corr)?.as_type(ElementType::Arith(field))
    }

    /// MulVVS: 两方私有值相乘，产出算术份额
    ///
    /// 提供者给出 a₀·a₁ = c₀ + c₁；双方交换 aᵢ + 各自明文后本地重组。
    pub fn mul_vvs(&mut self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        let (field, owner_x) = expect_private(x)?;
        let (_, owner_y) = expect_private(y)?;
        expect_same_field(x, y)?;
        expect_same_shape(x, y)?;
        if self.world_size() != 2 {
            return Err(MpcError::InvalidParameter(format!(
                "MulVVS is two-party only, world is {}",
                self.world_size()
            )));
        }
        if owner_x == owner_y {
            return Err(MpcError::InvalidRank(format!(
                "MulVVS operands must have distinct owners, both are {owner_x}"
            )));
        }
        if owner_x > 1 || owner_y > 1 {
            return Err(MpcError::InvalidRank(format!(
                "MulVVS owners must be in {{0,1}}, got {owner_x} and {owner_y}"
            )));
        }

        let pair = self.provider_mut().mul_priv(field, x.numel())?;
        let ring = ElementType::Ring(field);
        let a = Tensor::from_le_bytes(ring, x.shape(), &pair.a)?;
        let c = Tensor::from_le_bytes(ring, x.shape(), &pair.c)?;

        let me = self.rank();
        let peer = 1 - me;
        let own_input = if me == owner_x { x } else { y };
        let masked = ops::add(&a, &own_input.as_type(ring)?)?;
        self.comm().send_async(peer, &masked, "a0+x_or_a1+y")?;
        let tmp = self.comm().recv(peer, "a0+x_or_a1+y")?;
        self.comm().add_comm_stats_manually(1, 0);

        let z = if me == owner_x {
            // x 的持有方: tmp·x + c
            ops::add(&ops::mul(&tmp, &x.as_type(ring)?)?, &c)?
        } else {
            // y 的持有方: −a·tmp + c
            ops::add(&ops::neg(&ops::mul(&a, &tmp)?), &c)?
        };
        z.as_type(ElementType::Arith(field))
    }

    /// 公共的掩码打开子流程（逐元素与矩阵乘共用）
    fn beaver_mul(&mut self, x: &Tensor, y: &Tensor, mode: MulMode) -> Result<Tensor> {
        let field = x.field();
        let ring = ElementType::Ring(field);
        let matmul = mode == MulMode::MatMul;

        // 同一张量同时作两个操作数时压制第二侧的缓存，避免重复打开
        let aliased = x.buffer_id() == y.buffer_id();
        let qx = self.cache().get(x, matmul);
        let qy = if aliased {
            CacheQuery::default()
        } else {
            self.cache().get(y, matmul)
        };
        trace!(
            numel = x.numel(),
            matmul,
            hit_x = qx.hit.is_some(),
            hit_y = qy.hit.is_some(),
            "beaver_mul"
        );

        let replay_x = qx.hit.as_ref().map(|h| h.replay);
        let replay_y = qy.hit.as_ref().map(|h| h.replay);
        let triple = match mode {
            MulMode::Elementwise => {
                self.provider_mut().mul(field, x.numel(), replay_x, replay_y)?
            }
            MulMode::MatMul => {
                let (m, k) = (x.shape()[0], x.shape()[1]);
                let n = y.shape()[1];
                self.provider_mut().dot(field, m, n, k, replay_x, replay_y)?
            }
        };
        let out_shape = match mode {
            MulMode::Elementwise => x.shape().to_vec(),
            MulMode::MatMul => vec![x.shape()[0], y.shape()[1]],
        };
        let a = Tensor::from_le_bytes(ring, x.shape(), &triple.a)?;
        let b = Tensor::from_le_bytes(ring, y.shape(), &triple.b)?;
        let c = Tensor::from_le_bytes(ring, &out_shape, &triple.c)?;

        // 打开 x−a 与 y−b。两侧都需要打开且都未开启缓存时合并为一轮；
        // 缓存介入时保持逐个打开，使缓存写入顺序确定。
        let (ex, ey) = match (qx.hit, qy.hit) {
            (Some(hx), Some(hy)) => (hx.opened, hy.opened),
            (Some(hx), None) => {
                let ey = self
                    .comm()
                    .all_reduce_sum(&ops::sub(y, &b)?, "open(y-b)")?
                    .as_type(ring)?;
                if qy.enabled {
                    self.cache_mut().set(y, matmul, triple.desc_b, ey.clone());
                }
                (hx.opened, ey)
            }
            (None, Some(hy)) => {
                let ex = self
                    .comm()
                    .all_reduce_sum(&ops::sub(x, &a)?, "open(x-a)")?
                    .as_type(ring)?;
                if qx.enabled {
                    self.cache_mut().set(x, matmul, triple.desc_a, ex.clone());
                }
                (ex, hy.opened)
            }
            (None, None) => {
                let dx = ops::sub(x, &a)?.as_type(ring)?;
                let dy = ops::sub(y, &b)?.as_type(ring)?;
                if !qx.enabled && !qy.enabled {
                    self.open_pair(&dx, &dy, "open(x-a,y-b)")?
                } else {
                    let ex = self.comm().all_reduce_sum(&dx, "open(x-a)")?;
                    if qx.enabled {
                        self.cache_mut().set(x, matmul, triple.desc_a, ex.clone());
                    }
                    let ey = self.comm().all_reduce_sum(&dy, "open(y-b)")?;
                    if qy.enabled {
                        self.cache_mut().set(y, matmul, triple.desc_b, ey.clone());
                    }
                    (ex, ey)
                }
            }
        };

        // z_i = c_i + (x−a)·b_i + a_i·(y−b)，0 号方再加 (x−a)·(y−b)
        let prod = |l: &Tensor, r: &Tensor| -> Result<Tensor> {
            match mode {
                MulMode::Elementwise => ops::mul(l, r),
                MulMode::MatMul => ops::matmul(l, r),
            }
        };
        let mut z = ops::add(&c, &ops::add(&prod(&ex, &b)?, &prod(&a, &ey)?)?)?;
        if self.rank() == 0 {
            z = ops::add(&z, &prod(&ex, &ey)?)?;
        }
        z.as_type(ElementType::Arith(field))
    }

    /// 把两个待打开值拼成一个缓冲区，用一轮 all-reduce 同时打开
    fn open_pair(&self, u: &Tensor, v: &Tensor, tag: &str) -> Result<(Tensor, Tensor)> {
        let field = u.field();
        let ring = ElementType::Ring(field);
        let mut words = Vec::with_capacity(u.numel() + v.numel());
        words.extend_from_slice(u.words());
        words.extend_from_slice(v.words());
        let packed = Tensor::from_raw(ring, vec![words.len()], words);
        let opened = self.comm().all_reduce_sum(&packed, tag)?;
        let ou = Tensor::from_raw(ring, u.shape().to_vec(), opened.words()[..u.numel()].to_vec());
        let ov = Tensor::from_raw(ring, v.shape().to_vec(), opened.words()[u.numel()..].to_vec());
        Ok((ou, ov))
    }
}
