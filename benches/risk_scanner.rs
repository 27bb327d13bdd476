//! Benchmarks for script inspection
//!
//! A reload inspects every script in the folder: metadata parse, syntax check,
//! and a risk scan before each run. These keep that path cheap.
//! Run with: `cargo bench --bench risk_scanner`

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mlua::Lua;
use script_manager::core::scripts::interpreter::check_syntax;
use script_manager::core::scripts::{scan, ScriptMetadata};

// =============================================================================
// Benchmark Data
// =============================================================================

const CLEAN_SCRIPT: &str = r#"--[[
Description: Lists the layers of the current project
Toolbar: true
ToolbarLabel: Layers
]]
local layers = project and project.layers() or {}
for i, layer in ipairs(layers) do
    print(string.format("%d\t%s", i, layer.name))
end
"#;

const RISKY_SCRIPT: &str = r#"--[[
Description: Cleans temporary exports
]]
local handle = io.popen("ls /tmp")
for line in handle:lines() do
    if line:match("%.tmp$") then
        os.execute("rm /tmp/" .. line)
    end
end
handle:close()
local chunk = load("return 1")
"#;

fn long_script(lines: usize) -> String {
    let mut source = String::from("--[[\nDescription: generated\n]]\n");
    for i in 0..lines {
        source.push_str(&format!("local value_{i} = {i} * 2 -- line {i}\n"));
    }
    source
}

// =============================================================================
// Risk Scan Benchmarks
// =============================================================================

fn bench_scan_clean(c: &mut Criterion) {
    c.bench_function("scan_clean", |b| b.iter(|| scan(black_box(CLEAN_SCRIPT))));
}

fn bench_scan_risky(c: &mut Criterion) {
    c.bench_function("scan_risky", |b| b.iter(|| scan(black_box(RISKY_SCRIPT))));
}

fn bench_scan_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_by_size");
    for lines in [100, 1_000, 10_000] {
        let source = long_script(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &source, |b, source| {
            b.iter(|| scan(black_box(source)))
        });
    }
    group.finish();
}

// =============================================================================
// Reload Path Benchmarks
// =============================================================================

fn bench_metadata_parse(c: &mut Criterion) {
    c.bench_function("metadata_parse", |b| {
        b.iter(|| ScriptMetadata::parse(black_box(CLEAN_SCRIPT)))
    });
}

fn bench_syntax_check(c: &mut Criterion) {
    let lua = Lua::new();
    let path = Path::new("layers.lua");
    c.bench_function("syntax_check", |b| {
        b.iter(|| check_syntax(&lua, black_box(CLEAN_SCRIPT), path))
    });
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(scan_benchmarks, bench_scan_clean, bench_scan_risky, bench_scan_by_size,);

criterion_group!(reload_benchmarks, bench_metadata_parse, bench_syntax_check,);

criterion_main!(scan_benchmarks, reload_benchmarks);
