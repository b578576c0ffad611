use chunkseal_crypto::{derive_key_bytes, open_frame, seal_frame, MAX_CHUNK};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576, MAX_CHUNK])]
fn bench_seal_frame(bencher: divan::Bencher, size: usize) {
    let key = derive_key_bytes(b"bench passphrase");
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| seal_frame(divan::black_box(&key), divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576, MAX_CHUNK])]
fn bench_open_frame(bencher: divan::Bencher, size: usize) {
    let key = derive_key_bytes(b"bench passphrase");
    let data = make_data(size);
    let frame = seal_frame(&key, &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            open_frame(
                divan::black_box(&key),
                divan::black_box(&frame.nonce),
                divan::black_box(&frame.ciphertext),
                0,
            )
            .unwrap()
        });
}

#[divan::bench]
fn bench_derive_key() -> chunkseal_crypto::SymmetricKey {
    derive_key_bytes(divan::black_box(b"correct horse battery staple"))
}

fn main() {
    divan::main();
}
