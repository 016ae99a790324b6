//! Shell scripts standing in for the extraction tool.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Script prologue: finds the output directory from `--output <dir>/<template>`.
const PROLOGUE: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
dir=$(dirname "$out")
"#;

/// Writes an executable script named `name` into `bin_dir`; `body` runs after the prologue.
pub fn write_fake_tool(bin_dir: &Path, name: &str, body: &str) -> PathBuf {
    std::fs::create_dir_all(bin_dir).unwrap();
    let path = bin_dir.join(name);
    std::fs::write(&path, format!("{PROLOGUE}{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Tool that stalls on its first run and finishes on every later run.
pub fn stall_then_finish(bin_dir: &Path) -> PathBuf {
    write_fake_tool(
        bin_dir,
        "fake-yt-dlp",
        r#"echo run >> "$dir/invocations"
runs=$(wc -l < "$dir/invocations")
echo "[download] Destination: $dir/clip.mp4" >&2
if [ $((runs)) -lt 2 ]; then
  echo $$ > "$dir/pid"
  printf 'part' > "$dir/clip.mp4.part"
  echo "[download]  25.0% of 4.00KiB at 1.00KiB/s ETA 00:03" >&2
  exec sleep 30
fi
echo "[download]  25.0% of 4.00KiB at 1.00KiB/s ETA 00:03" >&2
echo "[download] 100.0% of 4.00KiB at 4.00KiB/s ETA 00:00" >&2
printf 'done' > "$dir/clip.mp4"
exit 0
"#,
    )
}

/// Tool that writes a partial file and never finishes.
pub fn always_stall(bin_dir: &Path) -> PathBuf {
    write_fake_tool(
        bin_dir,
        "fake-yt-dlp",
        r#"echo $$ > "$dir/pid"
printf 'part' > "$dir/clip.mp4.part"
echo "[download] Destination: $dir/clip.mp4" >&2
echo "[download]  10.0% of 4.00KiB at 1.00KiB/s ETA 00:04" >&2
exec sleep 30
"#,
    )
}

/// Tool that ignores SIGTERM and only goes away when killed.
pub fn ignores_terminate(bin_dir: &Path) -> PathBuf {
    write_fake_tool(
        bin_dir,
        "fake-yt-dlp",
        r#"trap '' TERM
echo $$ > "$dir/pid"
printf 'part' > "$dir/clip.mp4.part"
echo "[download] Destination: $dir/clip.mp4" >&2
echo "[download]  10.0% of 4.00KiB at 1.00KiB/s ETA 00:04" >&2
exec sleep 30
"#,
    )
}

/// Tool that fails the way yt-dlp does for a removed video.
pub fn unavailable(bin_dir: &Path) -> PathBuf {
    write_fake_tool(
        bin_dir,
        "fake-yt-dlp",
        r#"echo "[youtube] abc: Downloading webpage" >&2
echo "ERROR: [youtube] abc: Video unavailable" >&2
exit 1
"#,
    )
}

/// Reads the pid a fake tool recorded.
pub fn recorded_pid(dir: &Path) -> i32 {
    std::fs::read_to_string(dir.join("pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}
