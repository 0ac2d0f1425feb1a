// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Shared by every crate's `tests/`. Each crate keeps a `DEPS.md` with one
// `## name` heading per dependency, stating what it is used for.
use std::collections::BTreeSet;
use std::fs;

fn manifest_deps() -> BTreeSet<String> {
    let manifest = fs::read_to_string("Cargo.toml").expect("Cargo.toml must exist");
    let table = manifest
        .parse::<toml::Table>()
        .expect("Cargo.toml should not be malformed");

    ["dependencies", "build-dependencies", "dev-dependencies"]
        .iter()
        .filter_map(|section| table.get(*section).and_then(|v| v.as_table()))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

fn documented_deps() -> BTreeSet<String> {
    let markdown = fs::read_to_string("DEPS.md").expect("DEPS.md must exist");
    markdown
        .lines()
        .filter_map(|line| line.strip_prefix("## "))
        .map(|name| name.trim().to_string())
        .collect()
}

#[test]
fn check_deps_documented() {
    let listed = manifest_deps();
    let documented = documented_deps();

    let undocumented = listed.difference(&documented).collect::<Vec<_>>();
    assert!(
        undocumented.is_empty(),
        "some Cargo.toml dependencies are not in DEPS.md: {undocumented:?}"
    );

    let stale = documented.difference(&listed).collect::<Vec<_>>();
    assert!(
        stale.is_empty(),
        "DEPS.md lists dependencies no longer present in Cargo.toml: {stale:?}"
    );
}
