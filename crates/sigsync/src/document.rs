//! XHTML envelopes for previewing and exporting signatures
//!
//! Mail clients are picky about signature markup, so both the preview and the
//! exported file use an XHTML 1.0 Transitional document with an explicit
//! UTF-8 content type.

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

const DOCTYPE: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#;

const CONTENT_TYPE_META: &str =
    r#"<meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />"#;

const PREVIEW_STYLE: &str = r#"<style type="text/css">
        body {
            margin: 20px;
            font-family: Arial, sans-serif;
            line-height: 1.4;
        }
        .signature {
            max-width: 600px;
            margin: 0 auto;
        }
        a {
            color: inherit;
            text-decoration: none;
        }
        img {
            border: 0;
            display: inline-block;
            vertical-align: middle;
        }
    </style>"#;

/// Starter markup for a new signature
pub const DEFAULT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
    <head>
        <style type="text/css">body{font-family:Helvetica,Arial;font-size:13px}</style>
        <title></title>
    </head>
    <body>
        <div class="signature">
            <div style="font-size: 16px; line-height: 18px; letter-spacing: 0.1px">
                <b>Your Name</b>
            </div>
            <div style="font-size: 12px; line-height: 18px; letter-spacing: 0.1px">Position</div>
            <br />
            <div style="font-size: 12px; line-height: 17px; letter-spacing: 0.1px">t <a href="tel:+000000000" style="color: black; text-decoration: none;">+00 000 000</a></div>
            <div style="font-size: 12px; line-height: 17px; letter-spacing: 0.1px">m <a href="mailto:you@example.com" style="color: black; text-decoration: none;">you@example.com</a></div>
        </div>
    </body>
</html>"#;

/// Document shown in the preview pane
///
/// Content that already carries an XML declaration is a full document and is
/// shown as is.
pub fn preview_document(content: &str) -> String {
    if content.trim_start().starts_with("<?xml") {
        return content.to_string();
    }

    format!(
        "{XML_DECLARATION}\n{DOCTYPE}\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n    {CONTENT_TYPE_META}\n    {PREVIEW_STYLE}\n</head>\n<body>{content}</body>\n</html>\n"
    )
}

/// Standalone file offered for download
pub fn export_document(name: &str, content: &str) -> String {
    let title = escape_html(name);
    format!(
        "{XML_DECLARATION}\n{DOCTYPE}\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n    {CONTENT_TYPE_META}\n    <title>{title}</title>\n</head>\n<body>\n{content}\n</body>\n</html>"
    )
}

/// File name suggested for an exported template
pub fn export_file_name(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = if stem.is_empty() { "signature".to_string() } else { stem };
    format!("{}.html", stem)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
