//! Object key path utility functions / 对象路径工具函数

/// Normalize an object key / 规范化对象键
/// 1. Replace backslashes with forward slashes / 将反斜杠替换为正斜杠
/// 2. Drop a Windows drive prefix such as `C:` / 去掉盘符
/// 3. Clean `.`, `..` and duplicate `/` / 清理 . 和 .. 和重复的 /
///
/// A leading `/` is kept, a trailing one is not. A path that cleans down to
/// nothing becomes `/` when absolute and `.` otherwise.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = strip_drive(&path);
    clean_path(path)
}

/// Join key segments with `/` / 用 / 拼接对象键
///
/// Follows POSIX join rules: a segment starting with `/` restarts the key,
/// a separator is inserted between parts unless the key so far is empty or
/// already ends with one, and an empty last segment leaves a trailing `/`.
pub fn join<I, S>(base: &str, segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut key = base.to_string();
    for segment in segments {
        let segment = segment.as_ref();
        if segment.starts_with('/') {
            key = segment.to_string();
        } else if key.is_empty() || key.ends_with('/') {
            key.push_str(segment);
        } else {
            key.push('/');
            key.push_str(segment);
        }
    }
    key
}

/// Base name of a local path, used as the default object key on upload / 取文件名
pub fn base_name(path: &std::path::Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
}

fn strip_drive(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        &path[2..]
    } else {
        path
    }
}

/// Clean path, handle ., .. and duplicate / / 清理路径，处理 . 和 .. 和重复的 /
fn clean_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    match (absolute, parts.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", parts.join("/")),
        (false, true) => ".".to_string(),
        (false, false) => parts.join("/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), ".");
        assert_eq!(normalize("."), ".");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize("../.."), ".");
        assert_eq!(normalize("a/b/c"), "a/b/c");
        assert_eq!(normalize("/a/b/c/"), "/a/b/c");
        assert_eq!(normalize("a\\b\\c"), "a/b/c");
        assert_eq!(normalize("resources\\test_file.txt"), "resources/test_file.txt");
        assert_eq!(normalize("//a//b///c"), "/a/b/c");
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("C:\\data\\report.csv"), "/data/report.csv");
        assert_eq!(normalize("d:file.txt"), "file.txt");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "\\\\share\\\\dir\\.\\x",
            "a//b\\..\\c//",
            "/x/../../y",
            "./a/./b/.",
            "E:\\temp\\\\..\\out.bin",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "input: {sample:?}");
            assert!(!once.contains('\\'), "input: {sample:?}");
            assert!(!once.contains("//"), "input: {sample:?}");
            if once != "." {
                assert!(
                    once.split('/').all(|part| part != "." && part != ".."),
                    "input: {sample:?}"
                );
            }
        }
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", ["a.txt"]), "/a.txt");
        assert_eq!(join("a", ["b", "c"]), "a/b/c");
        assert_eq!(join("a", [""]), "a/");
        assert_eq!(join("a/", ["b"]), "a/b");
        assert_eq!(join("a", ["/b", "c"]), "/b/c");
        assert_eq!(join("", ["b"]), "b");
        assert_eq!(join("a", Vec::<String>::new()), "a");
    }

    #[test]
    fn test_base_name() {
        let path = std::path::Path::new("resources/test_file.txt");
        assert_eq!(base_name(path).as_deref(), Some("test_file.txt"));
        assert_eq!(base_name(std::path::Path::new("/")), None);
    }
}
