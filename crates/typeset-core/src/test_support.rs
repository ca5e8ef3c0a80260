//! Fake external tools for unit tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Stand-in for `typst compile`.
///
/// Writes one page per input (two if the input mentions `TWOPAGES`) and
/// reacts to marker words in the input: `FAIL` exits 1, `SLOW` sleeps
/// briefly, `HANG` sleeps far beyond any test timeout, `DETACH` leaves a
/// background process holding stderr open, `BARRIER` waits until every job
/// of the request has started. Arguments are appended to
/// `args.log` next to the script.
pub(crate) const FAKE_TYPST: &str = r#"
echo "$@" >> "$(dirname "$0")/args.log"
root=""
while [ "$#" -gt 2 ]; do
  if [ "$1" = "--root" ]; then root="$2"; fi
  shift
done
input="$1"
out="$2"
name=$(basename "$input" .typ)
touch "$root/started-$name"
if grep -q FAIL "$input"; then
  echo "error: forced failure in $name" >&2
  exit 1
fi
if grep -q DETACH "$input"; then
  echo "warning: left a helper running" >&2
  ( sleep 5 ) &
fi
if grep -q HANG "$input"; then
  sleep 30
fi
if grep -q SLOW "$input"; then
  sleep 0.3
fi
if grep -q BARRIER "$input"; then
  n=0
  while [ "$(ls "$root" | grep -c '^started-')" -lt "$(ls "$root" | grep -c '\.typ$')" ]; do
    n=$((n + 1))
    [ "$n" -lt 100 ] || exit 3
    sleep 0.05
  done
fi
printf 'page 1 of %s\n' "$name" > "$(echo "$out" | sed 's/{p}/1/')"
if grep -q TWOPAGES "$input"; then
  printf 'page 2 of %s\n' "$name" > "$(echo "$out" | sed 's/{p}/2/')"
fi
"#;

/// Stand-in for `mogrify`: logs its arguments to `mogrify.log` next to the
/// script and appends a line to the image it was given.
pub(crate) const FAKE_MOGRIFY: &str = r#"
echo "$@" >> "$(dirname "$0")/mogrify.log"
for last; do :; done
printf 'trimmed\n' >> "$last"
"#;

/// Write an executable `/bin/sh` script named `name` into `dir`.
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    let mut perms = fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("set perms");
    path
}
