//! Built-ins producing whole responses or reading external resources.
//!
//! `link` and `file` only touch the network or the disk in evaluate mode. In
//! test mode they still check their argument and return an empty value of the
//! right type.
//!
//! `file` returns a string, so the file must hold UTF-8 text. Binary payloads
//! are served through `link`, whose body is kept as raw bytes.

use super::{exactly, Builtin};
use crate::ast::{Expression, Mode};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::value::{HttpRsp, Value};
use bytes::Bytes;
use hyper::header::{HeaderValue, LOCATION};
use hyper::HeaderMap;
use std::fs;
use std::io::Read;
use tracing::debug;

const DEFAULT_REDIRECT_STATUS: i64 = 301;

pub(super) fn link(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [url] = exactly::<1>("link", "one argument of type 'string'", args)?;
    Ok(Builtin::Link(url))
}

pub(super) fn redirect(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    match args {
        [location] => Ok(Builtin::Redirect {
            location,
            status: None,
        }),
        [location, status] => Ok(Builtin::Redirect {
            location,
            status: Some(status),
        }),
        _ => Err(EvalError::Arity {
            name: "redirect",
            expected: "one or two arguments ('string', 'int')",
            found: args.len(),
        }),
    }
}

pub(super) fn file(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [path] = exactly::<1>("file", "one argument of type 'string'", args)?;
    Ok(Builtin::File(path))
}

pub(super) fn fetch(
    url: &Expression,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let url = url.expect_string(ctx, mode)?;
    match mode {
        Mode::Test => Ok(Value::from(HttpRsp::default())),
        Mode::Evaluate => {
            debug!("Fetching linked resource {}", url);
            ctx.resources.fetcher.fetch(&url).map(Value::from)
        }
    }
}

pub(super) fn redirect_to(
    location: &Expression,
    status: Option<&Expression>,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let location = location.expect_string(ctx, mode)?;
    let status = match status {
        Some(status) => status.expect_int(ctx, mode)?,
        None => DEFAULT_REDIRECT_STATUS,
    };
    if !(300..400).contains(&status) {
        return Err(EvalError::RedirectStatus(status));
    }

    let value = HeaderValue::from_str(&location)
        .map_err(|_| EvalError::RedirectLocation(location.clone()))?;
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, value);

    Ok(Value::from(HttpRsp {
        body: Bytes::new(),
        headers,
        // Range checked above.
        status_code: status as u16,
    }))
}

pub(super) fn read_file(
    path: &Expression,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let path = path.expect_string(ctx, mode)?;
    if mode == Mode::Test {
        return Ok(Value::Str(String::new()));
    }

    let file_error = |e: std::io::Error| EvalError::File {
        path: path.clone(),
        reason: e.to_string(),
    };
    let limit = ctx.resources.max_file_size;
    let file = fs::File::open(&path).map_err(file_error)?;
    let size = file.metadata().map_err(file_error)?.len();
    if size > limit {
        return Err(EvalError::FileTooLarge { path, size, limit });
    }

    // The file may grow between the size check and the read.
    let mut content = Vec::new();
    file.take(limit + 1)
        .read_to_end(&mut content)
        .map_err(file_error)?;
    if content.len() as u64 > limit {
        return Err(EvalError::FileTooLarge {
            size: content.len() as u64,
            path,
            limit,
        });
    }
    String::from_utf8(content)
        .map(Value::Str)
        .map_err(|_| EvalError::File {
            path,
            reason: "contents are not valid UTF-8 text".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use crate::{
        parse, EvalError, EvaluationContext, Fetcher, HttpRsp, RequestInfo, Resources, Value,
        Vars,
    };
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
    }

    impl Fetcher for CountingFetcher {
        fn fetch(&self, url: &str) -> Result<HttpRsp, EvalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpRsp {
                body: format!("fetched {url}").into(),
                status_code: 200,
                ..Default::default()
            })
        }
    }

    fn run(source: &str, resources: &Resources, test_mode: bool) -> Result<Value, EvalError> {
        let vars = Vars::new();
        let request = RequestInfo::default();
        let ctx = EvaluationContext::new(&vars, &request, resources);
        let expr = parse(source).unwrap();
        if test_mode {
            expr.test(&ctx)
        } else {
            expr.evaluate(&ctx)
        }
    }

    #[test]
    fn test_link_only_fetches_in_evaluate_mode() {
        let fetcher = Arc::new(CountingFetcher::default());
        let resources = Resources::new(fetcher.clone());

        let placeholder = run(r#"${link("http://upstream/a")}"#, &resources, true).unwrap();
        assert_eq!(placeholder, Value::from(HttpRsp::default()));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

        let rsp = run(r#"${link("http://upstream/a")}"#, &resources, false)
            .unwrap()
            .into_response()
            .unwrap();
        assert_eq!(rsp.body, "fetched http://upstream/a");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        assert!(run("${link(1)}", &resources, true).is_err());
    }

    #[test]
    fn test_redirect() {
        let resources = Resources::default();
        let rsp = run(r#"${redirect("https://example.com/")}"#, &resources, false)
            .unwrap()
            .into_response()
            .unwrap();
        assert_eq!(rsp.status_code, 301);
        assert_eq!(rsp.headers["location"], "https://example.com/");

        let rsp = run(r#"${redirect("/next", 307)}"#, &resources, false)
            .unwrap()
            .into_response()
            .unwrap();
        assert_eq!(rsp.status_code, 307);
    }

    #[test]
    fn test_redirect_rejects_non_3xx_status() {
        let resources = Resources::default();
        for mode in [false, true] {
            let err = run(r#"${redirect("/next", 200)}"#, &resources, mode).unwrap_err();
            assert_eq!(
                err.to_string(),
                "evaluation error: expected status code '3XX'; got '200' instead"
            );
        }
        assert!(run(r#"${redirect("/next", "302")}"#, &resources, false).is_err());
    }

    #[test]
    fn test_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "hello from disk").unwrap();
        let source = format!("${{file(\"{}\")}}", file.path().display());

        let resources = Resources::default();
        assert_eq!(
            run(&source, &resources, false).unwrap(),
            Value::from("hello from disk")
        );

        let small = Resources::default().with_max_file_size(4);
        assert!(matches!(
            run(&source, &small, false),
            Err(EvalError::FileTooLarge { size: 15, limit: 4, .. })
        ));
    }

    #[test]
    fn test_file_is_not_read_in_test_mode() {
        let resources = Resources::default();
        let source = r#"${file("/definitely/not/here.txt")}"#;
        assert_eq!(run(source, &resources, true).unwrap(), Value::from(""));
        assert!(matches!(
            run(source, &resources, false),
            Err(EvalError::File { .. })
        ));
        assert!(run("${file(true)}", &resources, true).is_err());
    }

    #[test]
    fn test_file_rejects_binary_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe]).unwrap();
        let source = format!("${{file(\"{}\")}}", file.path().display());

        let err = run(&source, &Resources::default(), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "evaluation error: could not read file '{}': contents are not valid UTF-8 text",
                file.path().display()
            )
        );
    }
}
