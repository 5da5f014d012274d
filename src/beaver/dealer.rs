//! Trusted third-party dealer
//!
//! An in-process realization of the Beaver provider: a shared core knows
//! every party's mask streams, prepares each correlation once, and hands
//! each party its slot. Parties must issue identical request sequences;
//! a diverging request is reported as a provider violation.
//!
//! Mask shares are generated from ChaCha20 streams keyed by
//! (dealer seed, counter, rank). A replay descriptor simply names a counter
//! that was already consumed, so the dealer reproduces the exact mask share
//! a previous multiplication used.

use super::{BeaverProvider, MulTriple, PrivMulPair, ReplayDesc, SquarePair, TruncPair, TruncPrTriple};
use crate::prg::derive_seed;
use crate::ring::{ops, ElementType, RingField, Tensor};
use crate::{MpcError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::{Arc, Mutex};
use tracing::trace;

struct OpOutput {
    bufs: Vec<Vec<u8>>,
    descs: Vec<ReplayDesc>,
}

struct PreparedOp {
    sig: String,
    slots: Vec<Option<OpOutput>>,
}

struct DealerCore {
    world: usize,
    seed: u64,
    next_counter: u64,
    split_rng: ChaCha20Rng,
    ops: Vec<PreparedOp>,
    cursor: Vec<usize>,
}

fn to_le(field: RingField, words: &[u128]) -> Vec<u8> {
    let elem = field.bytes();
    let mut out = Vec::with_capacity(words.len() * elem);
    for w in words {
        out.extend_from_slice(&w.to_le_bytes()[..elem]);
    }
    out
}

impl DealerCore {
    fn new(world: usize, seed: u64) -> DealerCore {
        DealerCore {
            world,
            seed,
            next_counter: 0,
            split_rng: ChaCha20Rng::from_seed(derive_seed("mpc_ring2k.dealer.split", &[seed])),
            ops: Vec::new(),
            cursor: vec![0; world],
        }
    }

    /// 第 rank 方在计数器 counter 处的掩码份额
    fn mask_share(&self, counter: u64, rank: usize, field: RingField, numel: usize) -> Vec<u128> {
        let mut rng = ChaCha20Rng::from_seed(derive_seed(
            "mpc_ring2k.dealer.mask",
            &[self.seed, counter, rank as u64],
        ));
        (0..numel).map(|_| field.mask(rng.gen::<u128>())).collect()
    }

    fn mask_all(&self, counter: u64, field: RingField, numel: usize) -> Vec<Vec<u128>> {
        (0..self.world)
            .map(|j| self.mask_share(counter, j, field, numel))
            .collect()
    }

    fn counter_for(&mut self, replay: Option<ReplayDesc>) -> Result<u64> {
        match replay {
            Some(d) => {
                if d.seed != self.seed || d.counter >= self.next_counter {
                    return Err(MpcError::ProviderViolation(format!(
                        "replay descriptor {{seed: {}, counter: {}}} was not issued by this dealer",
                        d.seed, d.counter
                    )));
                }
                Ok(d.counter)
            }
            None => {
                let c = self.next_counter;
                self.next_counter += 1;
                Ok(c)
            }
        }
    }

    fn sum_shares(field: RingField, shares: &[Vec<u128>]) -> Vec<u128> {
        let numel = shares[0].len();
        let mut acc = vec![0u128; numel];
        for s in shares {
            for (dst, &w) in acc.iter_mut().zip(s.iter()) {
                *dst = field.mask(dst.wrapping_add(w));
            }
        }
        acc
    }

    /// 将明文向量拆成 world 份加法份额
    fn split(&mut self, field: RingField, plain: &[u128]) -> Vec<Vec<u128>> {
        let mut shares = Vec::with_capacity(self.world);
        let mut last = plain.to_vec();
        for _ in 0..self.world - 1 {
            let part: Vec<u128> = (0..plain.len())
                .map(|_| field.mask(self.split_rng.gen::<u128>()))
                .collect();
            for (dst, &w) in last.iter_mut().zip(part.iter()) {
                *dst = field.mask(dst.wrapping_sub(w));
            }
            shares.push(part);
        }
        shares.push(last);
        shares
    }

    fn fetch(&mut self, rank: usize, sig: &str) -> Result<OpOutput> {
        let idx = self.cursor[rank];
        let op = &mut self.ops[idx];
        if op.sig != sig {
            return Err(MpcError::ProviderViolation(format!(
                "request sequences diverged at op {}: rank {} asked '{}' but '{}' was prepared",
                idx, rank, sig, op.sig
            )));
        }
        self.cursor[rank] = idx + 1;
        op.slots[rank].take().ok_or_else(|| {
            MpcError::ProviderViolation(format!("rank {rank} fetched op {idx} twice"))
        })
    }

    fn prepared(&self, rank: usize) -> bool {
        self.cursor[rank] < self.ops.len()
    }

    fn mul(
        &mut self,
        rank: usize,
        field: RingField,
        numel: usize,
        rx: Option<ReplayDesc>,
        ry: Option<ReplayDesc>,
    ) -> Result<OpOutput> {
        let sig = format!("mul:{field:?}:{numel}:{rx:?}:{ry:?}");
        if !self.prepared(rank) {
            let ca = self.counter_for(rx)?;
            let cb = self.counter_for(ry)?;
            let a_shares = self.mask_all(ca, field, numel);
            let b_shares = self.mask_all(cb, field, numel);
            let a = Self::sum_shares(field, &a_shares);
            let b = Self::sum_shares(field, &b_shares);
            let c: Vec<u128> = a
                .iter()
                .zip(b.iter())
                .map(|(&u, &v)| field.mask(u.wrapping_mul(v)))
                .collect();
            let c_shares = self.split(field, &c);
            let slots = (0..self.world)
                .map(|j| {
                    Some(OpOutput {
                        bufs: vec![
                            to_le(field, &a_shares[j]),
                            to_le(field, &b_shares[j]),
                            to_le(field, &c_shares[j]),
                        ],
                        descs: vec![
                            ReplayDesc { seed: self.seed, counter: ca },
                            ReplayDesc { seed: self.seed, counter: cb },
                        ],
                    })
                })
                .collect();
            trace!(numel, "dealer prepared mul triple");
            self.ops.push(PreparedOp { sig: sig.clone(), slots });
        }
        self.fetch(rank, &sig)
    }

    fn dot(
        &mut self,
        rank: usize,
        field: RingField,
        m: usize,
        n: usize,
        k: usize,
        rx: Option<ReplayDesc>,
        ry: Option<ReplayDesc>,
    ) -> Result<OpOutput> {
        let sig = format!("dot:{field:?}:{m}x{n}x{k}:{rx:?}:{ry:?}");
        if !self.prepared(rank) {
            let ca = self.counter_for(rx)?;
            let cb = self.counter_for(ry)?;
            let a_shares = self.mask_all(ca, field, m * k);
            let b_shares = self.mask_all(cb, field, k * n);
            let a = Tensor::from_raw(
                ElementType::Ring(field),
                vec![m, k],
                Self::sum_shares(field, &a_shares),
            );
            let b = Tensor::from_raw(
                ElementType::Ring(field),
                vec![k, n],
                Self::sum_shares(field, &b_shares),
            );
            let c = ops::matmul(&a, &b)?;
            let c_shares = self.split(field, c.words());
            let slots = (0..self.world)
                .map(|j| {
                    Some(OpOutput {
                        bufs: vec![
                            to_le(field, &a_shares[j]),
                            to_le(field, &b_shares[j]),
                            to_le(field, &c_shares[j]),
                        ],
                        descs: vec![
                            ReplayDesc { seed: self.seed, counter: ca },
                            ReplayDesc { seed: self.seed, counter: cb },
                        ],
                    })
                })
                .collect();
            trace!(m, n, k, "dealer prepared dot triple");
            self.ops.push(PreparedOp { sig: sig.clone(), slots });
        }
        self.fetch(rank, &sig)
    }

    fn square(
        &mut self,
        rank: usize,
        field: RingField,
        numel: usize,
        rx: Option<ReplayDesc>,
    ) -> Result<OpOutput> {
        let sig = format!("square:{field:?}:{numel}:{rx:?}");
        if !self.prepared(rank) {
            let ca = self.counter_for(rx)?;
            let a_shares = self.mask_all(ca, field, numel);
            let a = Self::sum_shares(field, &a_shares);
            let sq: Vec<u128> = a.iter().map(|&u| field.mask(u.wrapping_mul(u))).collect();
            let sq_shares = self.split(field, &sq);
            let slots = (0..self.world)
                .map(|j| {
                    Some(OpOutput {
                        bufs: vec![to_le(field, &a_shares[j]), to_le(field, &sq_shares[j])],
                        descs: vec![ReplayDesc { seed: self.seed, counter: ca }],
                    })
                })
                .collect();
            self.ops.push(PreparedOp { sig: sig.clone(), slots });
        }
        self.fetch(rank, &sig)
    }

    fn mul_priv(&mut self, rank: usize, field: RingField, numel: usize) -> Result<OpOutput> {
        let sig = format!("mul_priv:{field:?}:{numel}");
        if !self.prepared(rank) {
            if self.world != 2 {
                return Err(MpcError::InvalidParameter(format!(
                    "private multiplication pairs are two-party only, world is {}",
                    self.world
                )));
            }
            let a0: Vec<u128> = (0..numel)
                .map(|_| field.mask(self.split_rng.gen::<u128>()))
                .collect();
            let a1: Vec<u128> = (0..numel)
                .map(|_| field.mask(self.split_rng.gen::<u128>()))
                .collect();
            let c: Vec<u128> = a0
                .iter()
                .zip(a1.iter())
                .map(|(&u, &v)| field.mask(u.wrapping_mul(v)))
                .collect();
            let c_shares = self.split(field, &c);
            let slots = vec![
                Some(OpOutput {
                    bufs: vec![to_le(field, &a0), to_le(field, &c_shares[0])],
                    descs: vec![],
                }),
                Some(OpOutput {
                    bufs: vec![to_le(field, &a1), to_le(field, &c_shares[1])],
                    descs: vec![],
                }),
            ];
            self.ops.push(PreparedOp { sig: sig.clone(), slots });
        }
        self.fetch(rank, &sig)
    }

    fn trunc(&mut self, rank: usize, field: RingField, numel: usize, bits: u32) -> Result<OpOutput> {
        let sig = format!("trunc:{field:?}:{numel}:{bits}");
        if !self.prepared(rank) {
            let r: Vec<u128> = (0..numel)
                .map(|_| field.mask(self.split_rng.gen::<u128>()))
                .collect();
            let rs: Vec<u128> = r.iter().map(|&w| ops::arshift_word(field, w, bits)).collect();
            let r_shares = self.split(field, &r);
            let rs_shares = self.split(field, &rs);
            let slots = (0..self.world)
                .map(|j| {
                    Some(OpOutput {
                        bufs: vec![to_le(field, &r_shares[j]), to_le(field, &rs_shares[j])],
                        descs: vec![],
                    })
                })
                .collect();
            self.ops.push(PreparedOp { sig: sig.clone(), slots });
        }
        self.fetch(rank, &sig)
    }

    fn trunc_pr(
        &mut self,
        rank: usize,
        field: RingField,
        numel: usize,
        bits: u32,
    ) -> Result<OpOutput> {
        let sig = format!("trunc_pr:{field:?}:{numel}:{bits}");
        if !self.prepared(rank) {
            let k = field.bits();
            let low_mask = field.sign_bit() - 1;
            let r: Vec<u128> = (0..numel)
                .map(|_| field.mask(self.split_rng.gen::<u128>()))
                .collect();
            let rb: Vec<u128> = r.iter().map(|&w| (w >> (k - 1)) & 1).collect();
            let rc: Vec<u128> = r.iter().map(|&w| (w & low_mask) >> bits).collect();
            let r_shares = self.split(field, &r);
            let rc_shares = self.split(field, &rc);
            let rb_shares = self.split(field, &rb);
            let slots = (0..self.world)
                .map(|j| {
                    Some(OpOutput {
                        bufs: vec![
                            to_le(field, &r_shares[j]),
                            to_le(field, &rc_shares[j]),
                            to_le(field, &rb_shares[j]),
                        ],
                        descs: vec![],
                    })
                })
                .collect();
            self.ops.push(PreparedOp { sig: sig.clone(), slots });
        }
        self.fetch(rank, &sig)
    }
}

/// 可信第三方，持有所有参与方的掩码流
///
/// 通过 [`TrustedDealer::handle`] 为每个参与方发一个实现
/// [`BeaverProvider`] 的句柄。
pub struct TrustedDealer {
    core: Arc<Mutex<DealerCore>>,
}

impl TrustedDealer {
    pub fn new(world: usize, seed: u64) -> TrustedDealer {
        assert!(world >= 2, "a dealer needs at least two parties");
        TrustedDealer {
            core: Arc::new(Mutex::new(DealerCore::new(world, seed))),
        }
    }

    pub fn handle(&self, rank: usize) -> DealerHandle {
        DealerHandle {
            rank,
            core: Arc::clone(&self.core),
        }
    }
}

/// 单个参与方的提供者句柄
pub struct DealerHandle {
    rank: usize,
    core: Arc<Mutex<DealerCore>>,
}

impl DealerHandle {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, DealerCore>> {
        self.core
            .lock()
            .map_err(|_| MpcError::ProviderViolation("dealer core poisoned".to_string()))
    }
}

impl BeaverProvider for DealerHandle {
    fn mul(
        &mut self,
        field: RingField,
        numel: usize,
        replay_x: Option<ReplayDesc>,
        replay_y: Option<ReplayDesc>,
    ) -> Result<MulTriple> {
        let mut out = self.lock()?.mul(self.rank, field, numel, replay_x, replay_y)?;
        let c = out.bufs.pop().unwrap();
        let b = out.bufs.pop().unwrap();
        let a = out.bufs.pop().unwrap();
        Ok(MulTriple {
            a,
            b,
            c,
            desc_a: out.descs[0],
            desc_b: out.descs[1],
        })
    }

    fn dot(
        &mut self,
        field: RingField,
        m: usize,
        n: usize,
        k: usize,
        replay_x: Option<ReplayDesc>,
        replay_y: Option<ReplayDesc>,
    ) -> Result<MulTriple> {
        let mut out = self
            .lock()?
            .dot(self.rank, field, m, n, k, replay_x, replay_y)?;
        let c = out.bufs.pop().unwrap();
        let b = out.bufs.pop().unwrap();
        let a = out.bufs.pop().unwrap();
        Ok(MulTriple {
            a,
            b,
            c,
            desc_a: out.descs[0],
            desc_b: out.descs[1],
        })
    }

    fn square(
        &mut self,
        field: RingField,
        numel: usize,
        replay_x: Option<ReplayDesc>,
    ) -> Result<SquarePair> {
        let mut out = self.lock()?.square(self.rank, field, numel, replay_x)?;
        let sq = out.bufs.pop().unwrap();
        let a = out.bufs.pop().unwrap();
        Ok(SquarePair {
            a,
            sq,
            desc_a: out.descs[0],
        })
    }

    fn mul_priv(&mut self, field: RingField, numel: usize) -> Result<PrivMulPair> {
        let mut out = self.lock()?.mul_priv(self.rank, field, numel)?;
        let c = out.bufs.pop().unwrap();
        let a = out.bufs.pop().unwrap();
        Ok(PrivMulPair { a, c })
    }

    fn trunc(&mut self, field: RingField, numel: usize, bits: u32) -> Result<TruncPair> {
        let mut out = self.lock()?.trunc(self.rank, field, numel, bits)?;
        let rs = out.bufs.pop().unwrap();
        let r = out.bufs.pop().unwrap();
        Ok(TruncPair { r, rs })
    }

    fn trunc_pr(&mut self, field: RingField, numel: usize, bits: u32) -> Result<TruncPrTriple> {
        let mut out = self.lock()?.trunc_pr(self.rank, field, numel, bits)?;
        let rb = out.bufs.pop().unwrap();
        let rc = out.bufs.pop().unwrap();
        let r = out.bufs.pop().unwrap();
        Ok(TruncPrTriple { r, rc, rb })
    }
}
