//! Shared harness for whole-protocol tests
//!
//! Spawns one thread per party over a local mesh and a trusted dealer, all
//! derived from a fixed root seed so every test run is reproducible.

use mpc_ring2k::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use std::thread;

/// Run the same closure on every party and collect the results in rank order.
pub fn run_parties<T, F>(world: usize, seed: u64, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize, &mut Evaluator) -> T + Send + Sync + 'static,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();

    let dealer = TrustedDealer::new(world, seed.wrapping_add(0x6265_6176_6572));
    let comms = LocalMesh::connect(world);
    let f = Arc::new(f);
    let handles: Vec<_> = comms
        .into_iter()
        .enumerate()
        .map(|(rank, comm)| {
            let provider = dealer.handle(rank);
            let f = Arc::clone(&f);
            thread::spawn(move || {
                let prg = PrgState::setup(seed, rank, world);
                let mut ev = Evaluator::new(comm, prg, Box::new(provider));
                f(rank, &mut ev)
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("party thread panicked"))
        .collect()
}

/// Two's-complement encoding of a signed value into the ring.
pub fn encode(field: RingField, v: i128) -> u128 {
    field.mask(v as u128)
}

/// Signed interpretation of a ring element.
pub fn decode(field: RingField, w: u128) -> i128 {
    let k = field.bits();
    if k == 128 {
        w as i128
    } else if (w >> (k - 1)) & 1 == 1 {
        (w | !field.mask(u128::MAX)) as i128
    } else {
        w as i128
    }
}

/// Split signed values into `world` additive share vectors, deterministically.
pub fn share_values(field: RingField, values: &[i128], world: usize, seed: u64) -> Vec<Vec<u128>> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut shares: Vec<Vec<u128>> = vec![Vec::with_capacity(values.len()); world];
    for &v in values {
        let mut rest = encode(field, v);
        for party in shares.iter_mut().take(world - 1) {
            let r = field.mask(rng.gen::<u128>());
            party.push(r);
            rest = field.mask(rest.wrapping_sub(r));
        }
        shares[world - 1].push(rest);
    }
    shares
}

/// Build one party's arithmetic-share tensor from precomputed share words.
pub fn ashr_tensor(field: RingField, shape: &[usize], words: Vec<u128>) -> Tensor {
    Tensor::from_words(ElementType::Arith(field), shape, words).unwrap()
}

/// Open an arithmetic share and decode it into signed values.
pub fn open_signed(ev: &mut Evaluator, x: &Tensor) -> Vec<i128> {
    let field = x.field();
    ev.a2p(x)
        .unwrap()
        .words()
        .iter()
        .map(|&w| decode(field, w))
        .collect()
}
