//! Line-based unified diff used to describe a change to the generative
//! backend.

const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tag {
    Equal,
    Change,
}

/// A run over `a[a1..a2]` and `b[b1..b2]`. Equal runs cover matching lines;
/// change runs cover a deletion, an insertion, or both.
#[derive(Debug, Clone, Copy)]
struct Opcode {
    tag: Tag,
    a1: usize,
    a2: usize,
    b1: usize,
    b2: usize,
}

/// Unified diff of `original` against `updated`, three lines of context.
/// Identical inputs produce an empty string.
pub fn unified_diff(original: &str, updated: &str, path: &str) -> String {
    if original == updated {
        return String::new();
    }

    let a: Vec<&str> = original.lines().collect();
    let b: Vec<&str> = updated.lines().collect();
    let ops = opcodes(&a, &b);

    let mut out = String::new();
    out.push_str(&format!("--- a/{}\n", path));
    out.push_str(&format!("+++ b/{}\n", path));

    for hunk in group_into_hunks(ops) {
        let first = hunk[0];
        let last = hunk[hunk.len() - 1];
        out.push_str(&format!(
            "@@ -{} +{} @@\n",
            range_header(first.a1, last.a2),
            range_header(first.b1, last.b2)
        ));
        for op in hunk {
            match op.tag {
                Tag::Equal => {
                    for line in &a[op.a1..op.a2] {
                        out.push_str(&format!(" {}\n", line));
                    }
                }
                Tag::Change => {
                    for line in &a[op.a1..op.a2] {
                        out.push_str(&format!("-{}\n", line));
                    }
                    for line in &b[op.b1..op.b2] {
                        out.push_str(&format!("+{}\n", line));
                    }
                }
            }
        }
    }

    out
}

fn range_header(start: usize, end: usize) -> String {
    let length = end - start;
    if length == 1 {
        format!("{}", start + 1)
    } else {
        // zero-length ranges report the line before the gap
        format!("{},{}", if length == 0 { start } else { start + 1 }, length)
    }
}

/// Edit script via longest-common-subsequence backtracking.
fn opcodes(a: &[&str], b: &[&str]) -> Vec<Opcode> {
    let n = a.len();
    let m = b.len();
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops: Vec<Opcode> = Vec::new();
    let mut push = |tag: Tag, da: usize, db: usize, i: usize, j: usize| {
        if let Some(last) = ops.last_mut() {
            if last.tag == tag && last.a2 == i && last.b2 == j {
                last.a2 += da;
                last.b2 += db;
                return;
            }
        }
        ops.push(Opcode {
            tag,
            a1: i,
            a2: i + da,
            b1: j,
            b2: j + db,
        });
    };

    let mut i = 0;
    let mut j = 0;
    while i < n && j < m {
        if a[i] == b[j] {
            push(Tag::Equal, 1, 1, i, j);
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            push(Tag::Change, 1, 0, i, j);
            i += 1;
        } else {
            push(Tag::Change, 0, 1, i, j);
            j += 1;
        }
    }
    if i < n {
        push(Tag::Change, n - i, 0, i, j);
    }
    if j < m {
        push(Tag::Change, 0, m - j, i, j);
    }

    ops
}

/// Split the edit script into hunks: equal runs at the edges shrink to the
/// context width, and equal runs wider than twice the context start a new
/// hunk.
fn group_into_hunks(mut ops: Vec<Opcode>) -> Vec<Vec<Opcode>> {
    if ops.is_empty() {
        return Vec::new();
    }

    if let Some(first) = ops.first_mut() {
        if first.tag == Tag::Equal {
            let keep = (first.a2 - first.a1).min(CONTEXT);
            first.a1 = first.a2 - keep;
            first.b1 = first.b2 - keep;
        }
    }
    if let Some(last) = ops.last_mut() {
        if last.tag == Tag::Equal {
            let keep = (last.a2 - last.a1).min(CONTEXT);
            last.a2 = last.a1 + keep;
            last.b2 = last.b1 + keep;
        }
    }

    let mut hunks: Vec<Vec<Opcode>> = Vec::new();
    let mut current: Vec<Opcode> = Vec::new();
    for op in ops {
        if op.tag == Tag::Equal && op.a2 - op.a1 > 2 * CONTEXT && !current.is_empty() {
            current.push(Opcode {
                tag: Tag::Equal,
                a1: op.a1,
                a2: op.a1 + CONTEXT,
                b1: op.b1,
                b2: op.b1 + CONTEXT,
            });
            hunks.push(std::mem::take(&mut current));
            current.push(Opcode {
                tag: Tag::Equal,
                a1: op.a2 - CONTEXT,
                a2: op.a2,
                b1: op.b2 - CONTEXT,
                b2: op.b2,
            });
        } else {
            current.push(op);
        }
    }

    // A trailing all-equal group carries no change
    if current.iter().any(|op| op.tag == Tag::Change) {
        hunks.push(current);
    }
    hunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_inputs_yield_empty_diff() {
        assert_eq!(unified_diff("a\nb\n", "a\nb\n", "f.py"), "");
    }

    #[test]
    fn test_single_line_change() {
        let diff = unified_diff("a\nb\nc\n", "a\nx\nc\n", "f.py");
        assert!(diff.starts_with("--- a/f.py\n+++ b/f.py\n"));
        assert!(diff.contains("-b\n"));
        assert!(diff.contains("+x\n"));
        assert!(diff.contains(" a\n"));
        assert!(diff.contains(" c\n"));
    }

    #[test]
    fn test_distant_changes_produce_separate_hunks() {
        let original: String = (0..30).map(|i| format!("line{}\n", i)).collect();
        let updated = original
            .replace("line2\n", "changed2\n")
            .replace("line25\n", "changed25\n");

        let diff = unified_diff(&original, &updated, "f.py");
        assert_eq!(diff.matches("@@").count(), 4);
        assert!(diff.contains("-line2\n"));
        assert!(diff.contains("+changed25\n"));
        // lines far from both changes stay out of the diff
        assert!(!diff.contains("line12"));
    }

    #[test]
    fn test_pure_insertion() {
        let diff = unified_diff("a\nb\n", "a\nnew\nb\n", "f.py");
        assert!(diff.contains("+new\n"));
        let removals = diff
            .lines()
            .filter(|line| line.starts_with('-') && !line.starts_with("---"))
            .count();
        assert_eq!(removals, 0);
    }
}
