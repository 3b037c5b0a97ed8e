//! Server-rendered HTML pages.
//!
//! Every interpolated value goes through [`escape`].

use std::fmt::Write as _;

use axum::{http::StatusCode, response::Html};

use quill_types::api::{FeedbackForm, Flash, LoginForm, RegisterForm};
use quill_types::models::{Feedback, User};

use crate::forms::FormErrors;
use crate::user_path;

/// What every page needs from the session: who is logged in, and the
/// notices to show on this render.
#[derive(Debug, Default)]
pub struct Frame {
    pub identity: Option<String>,
    pub flashes: Vec<Flash>,
}

pub fn register(frame: &Frame, form: &RegisterForm, errors: &FormErrors) -> Html<String> {
    let mut body = String::from("<h1>Register</h1>\n<form method=\"post\" action=\"/register\">\n");
    body.push_str(&input("Username", "username", "text", &form.username, errors));
    body.push_str(&input("Password", "password", "password", "", errors));
    body.push_str(&input("Email", "email", "email", &form.email, errors));
    body.push_str(&input("First Name", "first_name", "text", &form.first_name, errors));
    body.push_str(&input("Last Name", "last_name", "text", &form.last_name, errors));
    body.push_str("<button type=\"submit\">Register</button>\n</form>\n");
    body.push_str("<p>Already have an account? <a href=\"/login\">Log in</a></p>\n");
    layout("Register", frame, &body)
}

pub fn login(frame: &Frame, form: &LoginForm, errors: &FormErrors) -> Html<String> {
    let mut body = String::from("<h1>Login</h1>\n<form method=\"post\" action=\"/login\">\n");
    body.push_str(&input("Username", "username", "text", &form.username, errors));
    body.push_str(&input("Password", "password", "password", "", errors));
    body.push_str("<button type=\"submit\">Login</button>\n</form>\n");
    body.push_str("<p>New here? <a href=\"/register\">Register</a></p>\n");
    layout("Login", frame, &body)
}

pub fn profile(frame: &Frame, user: &User, feedback: &[Feedback]) -> Html<String> {
    let home = user_path(&user.username);
    let mut body = String::new();

    let _ = write!(
        body,
        "<h1>{}</h1>\n<ul class=\"profile\">\n  <li>Username: {}</li>\n  <li>Email: {}</li>\n</ul>\n",
        escape(&user.full_name()),
        escape(&user.username),
        escape(&user.email),
    );

    body.push_str("<h2>Feedback</h2>\n");
    if feedback.is_empty() {
        body.push_str("<p>No feedback yet.</p>\n");
    }
    for item in feedback {
        let _ = write!(
            body,
            "<article class=\"feedback\">\n  <h3>{title}</h3>\n  <p>{content}</p>\n  \
             <a href=\"/feedback/{id}/update\">Edit</a>\n  \
             <form method=\"post\" action=\"/feedback/{id}/delete\"><button type=\"submit\">Delete</button></form>\n\
             </article>\n",
            title = escape(&item.title),
            content = escape(&item.content),
            id = item.id,
        );
    }

    let _ = write!(
        body,
        "<p><a href=\"{add}\">Add feedback</a></p>\n\
         <form method=\"post\" action=\"{delete}\"><button type=\"submit\">Delete account</button></form>\n",
        add = escape(&format!("{home}/feedback/add")),
        delete = escape(&format!("{home}/delete")),
    );

    layout(&user.username, frame, &body)
}

/// Shared by the add and edit pages; `action` is where the form posts.
pub fn feedback_form(
    frame: &Frame,
    heading: &str,
    action: &str,
    form: &FeedbackForm,
    errors: &FormErrors,
) -> Html<String> {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<h1>{}</h1>\n<form method=\"post\" action=\"{}\">",
        escape(heading),
        escape(action)
    );
    body.push_str(&input("Title", "title", "text", &form.title, errors));

    let _ = write!(
        body,
        "<label>Content<br><textarea name=\"content\">{}</textarea></label>\n{}",
        escape(&form.content),
        field_errors(errors.field("content")),
    );
    body.push_str("<button type=\"submit\">Save</button>\n</form>\n");
    layout(heading, frame, &body)
}

pub fn error_page(frame: &Frame, status: StatusCode, message: &str) -> Html<String> {
    let title = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        "<h1>{} {}</h1>\n<p>{}</p>\n<p><a href=\"/\">Home</a></p>\n",
        status.as_u16(),
        escape(title),
        escape(message)
    );
    layout(title, frame, &body)
}

fn layout(title: &str, frame: &Frame, body: &str) -> Html<String> {
    let mut page = String::with_capacity(body.len() + 512);
    let _ = write!(
        page,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{} | Quill</title>\n</head>\n<body>\n<nav>\n",
        escape(title)
    );

    match &frame.identity {
        Some(username) => {
            let _ = writeln!(
                page,
                "  <a href=\"{}\">{}</a> | <a href=\"/logout\">Logout</a>",
                escape(&user_path(username)),
                escape(username)
            );
        }
        None => page.push_str("  <a href=\"/register\">Register</a> | <a href=\"/login\">Login</a>\n"),
    }
    page.push_str("</nav>\n<main>\n");

    for flash in &frame.flashes {
        let _ = writeln!(
            page,
            "<div class=\"flash flash-{}\">{}</div>",
            flash.level.as_str(),
            escape(&flash.message)
        );
    }

    page.push_str(body);
    page.push_str("</main>\n</body>\n</html>\n");
    Html(page)
}

fn input(label: &str, name: &str, kind: &str, value: &str, errors: &FormErrors) -> String {
    format!(
        "<label>{label}<br><input type=\"{kind}\" name=\"{name}\" value=\"{value}\"></label>\n{errors}",
        label = escape(label),
        value = escape(value),
        errors = field_errors(errors.field(name)),
    )
}

fn field_errors(messages: &[String]) -> String {
    messages
        .iter()
        .map(|m| format!("<p class=\"field-error\">{}</p>\n", escape(m)))
        .collect()
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_types::api::FlashLevel;

    #[test]
    fn user_content_is_escaped() {
        let user = User {
            username: "alice".into(),
            email: "a@x.com".into(),
            first_name: "<b>A</b>".into(),
            last_name: "L".into(),
        };
        let feedback = [Feedback {
            id: 7,
            title: "<script>alert(1)</script>".into(),
            content: "\"quoted\" & 'single'".into(),
            username: "alice".into(),
        }];

        let Html(page) = profile(&Frame::default(), &user, &feedback);
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(page.contains("&quot;quoted&quot; &amp; &#39;single&#39;"));
        assert!(page.contains("&lt;b&gt;A&lt;/b&gt; L"));
        assert!(page.contains("/feedback/7/update"));
    }

    #[test]
    fn field_errors_render_under_their_field() {
        let mut errors = FormErrors::default();
        errors.add("username", "Invalid username or password.");
        let form = LoginForm {
            username: "alice".into(),
            password: "secret1".into(),
        };

        let Html(page) = login(&Frame::default(), &form, &errors);
        assert!(page.contains("value=\"alice\""));
        assert!(page.contains("<p class=\"field-error\">Invalid username or password.</p>"));
        // Passwords are never echoed back.
        assert!(!page.contains("secret1"));
    }

    #[test]
    fn nav_and_flashes_follow_the_frame() {
        let frame = Frame {
            identity: Some("alice".into()),
            flashes: vec![Flash {
                level: FlashLevel::Success,
                message: "Welcome back!".into(),
            }],
        };
        let Html(page) = register(&frame, &RegisterForm::default(), &FormErrors::default());
        assert!(page.contains("href=\"/users/alice\""));
        assert!(page.contains("href=\"/logout\""));
        assert!(page.contains("<div class=\"flash flash-success\">Welcome back!</div>"));
    }
}
