//! # 随机源模块 (PRG / PRSS Module)
//!
//! 私有随机性与相关随机性。每个参与方持有：
//!
//! - 一条仅自己知道的私有随机流（RandA 等本地采样使用）；
//! - PRSS 种子环 s₀,…,s_{N−1} 中与自己相邻的两枚种子（sᵢ 与 s_{i−1}）。
//!
//! `gen_prss_pair` 在第 ctr 次调用时返回 (r₀, r₁) = (G(sᵢ, ctr), G(s_{i−1}, ctr))。
//! 相邻两方满足 r₀⁽ⁱ⁾ = r₁⁽ⁱ⁺¹⁾，因此 Σᵢ (r₀ − r₁) = 0 —— 各方无需通信即可
//! 共同采样一个零和元组。计数器随每次调用前进，要求所有参与方以锁步方式
//! 执行相同的操作序列。

use crate::ring::{ElementType, RingField, Tensor};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

/// 从标签与整数参数派生一枚 256 位种子
pub(crate) fn derive_seed(label: &str, parts: &[u64]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    for p in parts {
        hasher.update(p.to_le_bytes());
    }
    hasher.finalize().into()
}

fn sample_words(rng: &mut ChaCha20Rng, field: RingField, numel: usize) -> Vec<u128> {
    (0..numel).map(|_| field.mask(rng.gen::<u128>())).collect()
}

/// 参与方的随机源状态
pub struct PrgState {
    priv_rng: ChaCha20Rng,
    self_seed: [u8; 32],
    prev_seed: [u8; 32],
    prss_counter: u64,
}

impl PrgState {
    /// 从根种子派生本方的私有流与 PRSS 种子对
    ///
    /// 所有参与方必须用同一 `root_seed` 调用，PRSS 相关性才成立。
    pub fn setup(root_seed: u64, rank: usize, world: usize) -> PrgState {
        assert!(rank < world, "rank {rank} out of world {world}");
        let prev = (rank + world - 1) % world;
        PrgState {
            priv_rng: ChaCha20Rng::from_seed(derive_seed(
                "mpc_ring2k.prg.priv",
                &[root_seed, rank as u64],
            )),
            self_seed: derive_seed("mpc_ring2k.prg.prss", &[root_seed, rank as u64]),
            prev_seed: derive_seed("mpc_ring2k.prg.prss", &[root_seed, prev as u64]),
            prss_counter: 0,
        }
    }

    /// 私有均匀环张量
    pub fn gen_priv(&mut self, field: RingField, shape: &[usize]) -> Tensor {
        let numel = shape.iter().product();
        let words = sample_words(&mut self.priv_rng, field, numel);
        Tensor::from_raw(ElementType::Ring(field), shape.to_vec(), words)
    }

    /// 相关随机对 (r₀, r₁)，相邻参与方之间满足 r₀⁽ⁱ⁾ = r₁⁽ⁱ⁺¹⁾
    pub fn gen_prss_pair(&mut self, field: RingField, shape: &[usize]) -> (Tensor, Tensor) {
        let ctr = self.prss_counter;
        self.prss_counter += 1;
        let numel: usize = shape.iter().product();

        let mut rng0 = ChaCha20Rng::from_seed(self.self_seed);
        rng0.set_stream(ctr);
        let r0 = sample_words(&mut rng0, field, numel);

        let mut rng1 = ChaCha20Rng::from_seed(self.prev_seed);
        rng1.set_stream(ctr);
        let r1 = sample_words(&mut rng1, field, numel);

        (
            Tensor::from_raw(ElementType::Ring(field), shape.to_vec(), r0),
            Tensor::from_raw(ElementType::Ring(field), shape.to_vec(), r1),
        )
    }
}
