// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Benchmarks for the amount codec and record decoding.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Rendering and parsing display amounts
//! - Decoding a group snapshot from a tagged value
//! - Building, assembling and XDR-encoding a transaction

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use sorosave_sdk::amount::{DEFAULT_SCALE, from_display, to_display};
use sorosave_sdk::keys::{encode_account_id, encode_contract_id};
use sorosave_sdk::xdr::{
    ExtensionPoint, LedgerFootprint, ScMap, ScVec, SorobanResources, SorobanTransactionData, VecM,
};
use sorosave_sdk::{
    Address, Decoder, ScMapEntry, ScVal, Simulation, SourceAccount, TESTNET_PASSPHRASE,
    TransactionBuilder, invoke_contract, scval,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn account(i: usize) -> Address {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&(i as u64).to_be_bytes());
    Address::new(encode_account_id(&key))
}

fn entry(key: &str, val: ScVal) -> ScMapEntry {
    ScMapEntry {
        key: ScVal::Symbol(scval::symbol("key", key).unwrap()),
        val,
    }
}

fn list(items: Vec<ScVal>) -> ScVal {
    ScVal::Vec(Some(ScVec(items.try_into().unwrap())))
}

fn group_snapshot(members: usize) -> ScVal {
    let addresses: Vec<ScVal> = (0..members)
        .map(|i| scval::address("member", &account(i)).unwrap())
        .collect();
    let token = Address::new(encode_contract_id(&[5; 32]));
    let entries = vec![
        entry("admin", scval::address("admin", &account(0)).unwrap()),
        entry("contribution_amount", scval::i128(10_000_000)),
        entry("created_at", scval::u64(1_700_000_000)),
        entry("current_round", scval::u32(1)),
        entry("cycle_length", scval::u64(604_800)),
        entry("id", scval::u64(7)),
        entry("max_members", scval::u32(members as u32)),
        entry("members", list(addresses.clone())),
        entry("name", scval::string("name", "Pool A").unwrap()),
        entry("payout_order", list(addresses)),
        entry(
            "status",
            list(vec![ScVal::Symbol(scval::symbol("status", "Active").unwrap())]),
        ),
        entry("token", scval::address("token", &token).unwrap()),
        entry("total_rounds", scval::u32(members as u32)),
    ];
    ScVal::Map(Some(ScMap(entries.try_into().unwrap())))
}

// =============================================================================
// Amount Codec
// =============================================================================

fn bench_amount_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("amount");

    group.bench_function("to_display", |b| {
        b.iter(|| to_display(black_box(123_456_789_012_345), DEFAULT_SCALE))
    });
    group.bench_function("from_display", |b| {
        b.iter(|| from_display(black_box("12345678.9012345"), DEFAULT_SCALE))
    });
    group.bench_function("from_display_max", |b| {
        b.iter(|| {
            from_display(
                black_box("17014118346046923173168730371588.4105727"),
                DEFAULT_SCALE,
            )
        })
    });

    group.finish();
}

// =============================================================================
// Decoding
// =============================================================================

fn bench_group_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_group");
    let decoder = Decoder::default();

    for members in [2, 20, 200] {
        let snapshot = group_snapshot(members);
        group.throughput(Throughput::Elements(members as u64));
        group.bench_with_input(BenchmarkId::from_parameter(members), &snapshot, |b, s| {
            b.iter(|| decoder.from_scval(black_box(s), Decoder::group))
        });
    }

    group.finish();
}

// =============================================================================
// Envelope Construction
// =============================================================================

fn bench_envelope(c: &mut Criterion) {
    let simulation = Simulation {
        transaction_data: Some(SorobanTransactionData {
            ext: ExtensionPoint::V0,
            resources: SorobanResources {
                footprint: LedgerFootprint {
                    read_only: VecM::default(),
                    read_write: VecM::default(),
                },
                instructions: 2_000_000,
                read_bytes: 4_000,
                write_bytes: 1_000,
            },
            resource_fee: 25_000,
        }),
        min_resource_fee: 25_000,
        retval: None,
        auth: Vec::new(),
        latest_ledger: 1000,
    };
    let contract = Address::new(encode_contract_id(&[3; 32]));
    let member = scval::address("member", &account(2)).unwrap();
    let source = account(1);

    c.bench_function("build_assemble_encode", |b| {
        b.iter(|| {
            let invocation =
                invoke_contract(&contract, "contribute", vec![member.clone(), scval::u64(7)])?;
            TransactionBuilder::new(
                SourceAccount::new(source.clone(), black_box(41)),
                TESTNET_PASSPHRASE,
            )
            .operation(invocation)
            .build_at(1_700_000_000)?
            .assemble(&simulation)?
            .to_xdr_base64()
        })
    });
}

criterion_group!(
    benches,
    bench_amount_codec,
    bench_group_decode,
    bench_envelope
);
criterion_main!(benches);
