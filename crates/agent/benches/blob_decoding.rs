//! Performance benchmarks for request handling.
//!
//! These benchmarks measure the hot paths of a signing request:
//! - Auth blob decoding
//! - Confirmation code derivation
//! - Report encoding for the token
//! - A full scripted signing exchange

use std::time::Duration;

use agent::device::report::encode_message;
use agent::prompt::ConfirmationRequest;
use agent::{
    sign_challenge, AgentError, Challenge, DeviceTransport, Opcode, ScriptedResponse,
    ScriptedTransport, SigningPolicy, Slot,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use protocol::{decode_auth_blob, derive_code, AuthRequest, PublicKeyRecord};
use tokio_util::sync::CancellationToken;

const KEY: [u8; 32] = [
    0xd7, 0x5a, 0x98, 0x01, 0x82, 0xb1, 0x0a, 0xb7, 0xd5, 0x4b, 0xfe, 0xd3, 0xc9, 0x64, 0x07,
    0x3a, 0x0e, 0xe1, 0x72, 0xf3, 0xda, 0xa6, 0x23, 0x25, 0xaf, 0x02, 0x1a, 0x68, 0xf7, 0x07,
    0x51, 0x1a,
];

fn sample_blob(user: &str) -> Vec<u8> {
    AuthRequest {
        nonce: vec![0x11; 32],
        message_type: protocol::SSH_MSG_USERAUTH_REQUEST,
        user: user.to_string(),
        connection_id: "ssh-connection".to_string(),
        auth_method: "publickey".to_string(),
        has_signature: 1,
        key_type: "ssh-ed25519".to_string(),
        public_key: PublicKeyRecord::ed25519(KEY).unwrap(),
    }
    .to_blob()
    .unwrap()
}

/// Benchmark structural decoding of auth blobs.
fn bench_blob_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("blob_decoding");

    // Typical login
    let blob = sample_blob("alice");
    group.throughput(Throughput::Bytes(blob.len() as u64));
    group.bench_function("typical", |b| {
        b.iter(|| decode_auth_blob(black_box(&blob)).unwrap());
    });

    // Long user name
    let long_blob = sample_blob(&"u".repeat(4096));
    group.throughput(Throughput::Bytes(long_blob.len() as u64));
    group.bench_function("long_user_4KB", |b| {
        b.iter(|| decode_auth_blob(black_box(&long_blob)).unwrap());
    });

    group.finish();
}

/// Benchmark confirmation code derivation.
fn bench_code_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("code_derivation");

    let blob = sample_blob("alice");
    group.throughput(Throughput::Bytes(blob.len() as u64));
    group.bench_function("typical", |b| {
        b.iter(|| derive_code(black_box(&blob)));
    });

    group.finish();
}

/// Benchmark splitting challenges into HID reports.
fn bench_report_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("report_encoding");

    let blob = sample_blob("alice");
    group.throughput(Throughput::Bytes(blob.len() as u64));
    group.bench_function("challenge", |b| {
        b.iter(|| encode_message(Opcode::SignChallenge, 101, black_box(&blob)));
    });

    group.finish();
}

/// Benchmark a signing exchange against a scripted token.
fn bench_scripted_signing(c: &mut Criterion) {
    let blob = sample_blob("alice");
    let slot = Slot::from_index(1).unwrap();
    let policy = SigningPolicy {
        max_attempts: 10,
        poll_timeout: Duration::ZERO,
    };

    c.bench_function("scripted_signing", |b| {
        b.iter(|| {
            let mut transport = ScriptedTransport::with_responses([
                ScriptedResponse::Silence,
                ScriptedResponse::Data(vec![0x80; 64]),
            ]);
            transport.open().unwrap();
            let challenge = Challenge {
                slot,
                blob: &blob,
                user: "alice",
                host: "",
            };
            sign_challenge(
                &mut transport,
                challenge,
                &mut |_: &ConfirmationRequest<'_>, _: &CancellationToken| -> Result<(), AgentError> {
                    Ok(())
                },
                &CancellationToken::new(),
                policy,
            )
            .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_blob_decoding,
    bench_code_derivation,
    bench_report_encoding,
    bench_scripted_signing,
);
criterion_main!(benches);
