//! Static log corpora in the shapes the two services actually write.

/// Primary service: JSON lines. Request records nest their fields inside
/// `message`.
pub const CORPUS_PRIMARY: &[&str] = &[
    r#"{"level":"info","message":"Server listening on port 4000","timestamp":"2025-07-01T09:00:00.000Z"}"#,
    r#"{"level":"info","message":{"endpoint":"/api/login","ip":"10.0.0.9","method":"POST","status_code":200,"response_time":"34ms","user_agent":"Mozilla/5.0","user_id":"17","req_id":"r-1"},"timestamp":"2025-07-01T09:00:01.000Z"}"#,
    r#"{"level":"error","message":"Database timeout for user_id=17","req_id":"r-2","ip":"10.0.0.9","timestamp":"2025-07-01T09:00:02.000Z"}"#,
    r#"{"level":"warn","message":"Rate limit approaching","timestamp":"2025-07-01T09:00:03.000Z"}"#,
    r#"{"level":"info","message":{"endpoint":"/api/items","ip":"10.0.0.3","method":"GET","status_code":404,"response_time":"n/a"},"timestamp":"2025-07-01T09:00:04.000Z"}"#,
];

/// Secondary service: JSON records plus Apache-style access lines.
pub const CORPUS_SECONDARY: &[&str] = &[
    r#"{"level":"INFO","timestamp":"2025-07-01 09:10:00","message":"Worker booted","name":"app","function":"boot","filename":"main.py","path":"/srv/app/main.py"}"#,
    r#"{"level":"INFO","timestamp":"2025-07-01 09:10:01","path":"/search","method":"GET","status_code":200,"duration_ms":12.5,"client_ip":"10.1.1.1","user_agent":"\"curl/8.0\"","request_id":"abc","url":"http://h/search?q=1"}"#,
    r#"{"level":"ERROR","timestamp":"2025-07-01T10:00:00","message":"Validation error on payload","name":"api","function":"create","filename":"views.py","user_id":7,"exception":{"type":"ValueError","message":"bad","traceback":"Traceback ..."}}"#,
    r#"10.1.1.2 - 42 [01/Jul/2025:09:10:03 +0000] "GET /api/items?page=2 HTTP/1.1" 200 512 "-" "curl/8.0" 3.2 ms"#,
    r#"10.1.1.3 - anonymous [01/Jul/2025:09:10:04 +0000] "POST /api/upload HTTP/1.1" 500 0"#,
];

/// Lines matching no known format; handled by the generic fallback.
pub const CORPUS_UNSTRUCTURED: &[&str] = &[
    "2025-07-01 10:00:00 INFO  Starting application version 2.4.1",
    "2025-07-01 10:00:01 ERROR Failed to connect to database after 3 retries",
    "[2025-07-01T10:00:03Z] WARN: Disk usage at 92% on /dev/sda1",
    "no severity and no timestamp at all",
];

/// Structured-looking lines that cannot be decoded.
pub const CORPUS_MALFORMED: &[&str] = &[
    r#"{"level":"info","message":"#,
    r#"{"level": info}"#,
    "{",
];

/// `n` distinct primary-service JSON lines, one second apart.
pub fn corpus_high_volume(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let level = match i % 10 {
                0 => "error",
                1 | 2 => "warn",
                _ => "info",
            };
            format!(
                r#"{{"level":"{level}","message":"log line {i}","timestamp":"2025-07-01T{:02}:{:02}:{:02}Z","seq":{i}}}"#,
                i / 3600 % 24,
                i / 60 % 60,
                i % 60,
            )
        })
        .collect()
}
