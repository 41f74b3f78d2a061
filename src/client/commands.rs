//! Argument vectors for the gateway commands.

use std::path::Path;

/// `<program> access import <alias> <grant>`
pub(crate) fn access_import(program: &str, alias: &str, access_grant: &str) -> Vec<String> {
    argv(program, &["access", "import", alias, access_grant])
}

/// `<program> cp <local> <uri> --metadata <json>`
pub(crate) fn upload(program: &str, local: &Path, uri: &str, metadata_json: &str) -> Vec<String> {
    let local = local.to_string_lossy();
    argv(program, &["cp", &*local, uri, "--metadata", metadata_json])
}

/// `<program> ls <prefix> --o json`
pub(crate) fn list(program: &str, prefix_uri: &str) -> Vec<String> {
    argv(program, &["ls", prefix_uri, "--o", "json"])
}

/// `<program> meta get <uri>`
pub(crate) fn meta_get(program: &str, uri: &str) -> Vec<String> {
    argv(program, &["meta", "get", uri])
}

/// `<program> rm <uri>`
pub(crate) fn remove(program: &str, uri: &str) -> Vec<String> {
    argv(program, &["rm", uri])
}

fn argv(program: &str, args: &[&str]) -> Vec<String> {
    std::iter::once(program)
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}
