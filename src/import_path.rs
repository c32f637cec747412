use std::path::{Component, Path};

/// Module specifier that imports `helper` from `file`: relative to the file's
/// directory, extension stripped, `/`-separated and always starting with
/// `./` or `../`.
pub fn import_specifier(file: &Path, helper: &Path) -> String {
    let from = lexical_parts(file.parent().unwrap_or_else(|| Path::new("")));
    let to = lexical_parts(&helper.with_extension(""));

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<&str> = Vec::with_capacity(from.len() + to.len() - 2 * common);
    parts.extend(std::iter::repeat("..").take(from.len() - common));
    parts.extend(to[common..].iter().map(String::as_str));

    let joined = parts.join("/");
    if joined.starts_with("./") || joined.starts_with("../") {
        joined
    } else {
        format!("./{joined}")
    }
}

/// Path components with `.` dropped and `..` folded, without touching the
/// filesystem.
fn lexical_parts(path: &Path) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for c in path.components() {
        match c {
            Component::Prefix(p) => out.push(p.as_os_str().to_string_lossy().into_owned()),
            Component::RootDir => out.push("/".to_string()),
            Component::CurDir => {}
            Component::ParentDir => match out.last().map(String::as_str) {
                Some("..") | None => out.push("..".to_string()),
                Some("/") => {}
                Some(_) => {
                    out.pop();
                }
            },
            Component::Normal(s) => out.push(s.to_string_lossy().into_owned()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(file: &str, helper: &str) -> String {
        import_specifier(Path::new(file), Path::new(helper))
    }

    #[test]
    fn sibling_directory() {
        assert_eq!(
            rel("/app/src/screens/Home.tsx", "/app/src/perf/instrument.ts"),
            "../perf/instrument"
        );
    }

    #[test]
    fn same_directory_gets_dot_prefix() {
        assert_eq!(rel("/app/src/Home.tsx", "/app/src/instrument.js"), "./instrument");
    }

    #[test]
    fn nested_helper() {
        assert_eq!(rel("/app/App.js", "/app/src/perf/instrument.tsx"), "./src/perf/instrument");
    }

    #[test]
    fn deeper_file() {
        assert_eq!(
            rel("/app/src/a/b/c/Deep.tsx", "/app/src/instrument.ts"),
            "../../../instrument"
        );
    }

    #[test]
    fn dots_are_folded() {
        assert_eq!(
            rel("/app/src/./x/../screens/Home.tsx", "/app/src/perf/../perf/instrument.ts"),
            "../perf/instrument"
        );
    }

    #[test]
    fn stable() {
        let a = rel("/app/src/screens/Home.tsx", "/app/lib/instrument.ts");
        let b = rel("/app/src/screens/Home.tsx", "/app/lib/instrument.ts");
        assert_eq!(a, b);
        assert_eq!(a, "../../lib/instrument");
    }
}
