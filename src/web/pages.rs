//! Server-rendered HTML.

use crate::{
    client::{CallbackFailure, Route, StatusMessage},
    identity::Identity,
    projects::Project,
};
use axum::response::Html;
use std::time::Duration;

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:800px;margin:60px auto;padding:16px}\
input{padding:10px;border:1px solid #ddd;border-radius:8px}\
button{padding:10px 20px;border:1px solid #ddd;border-radius:8px;cursor:pointer}\
.success{color:green}.error{color:#c00}\
.project{display:flex;justify-content:space-between;padding:16px;border:1px solid #ddd;border-radius:8px;margin-bottom:8px}";

/// Disables a form's buttons once it submits. Runs after the form data is
/// collected, so the clicked button's `name=value` is still sent.
const DISABLE_ON_SUBMIT: &str =
    "setTimeout(() => this.querySelectorAll('button').forEach((b) => { b.disabled = true; }))";

/// Escape text for use in element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, head: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n{head}</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape(title),
    ))
}

fn status_line(status: Option<&StatusMessage>) -> String {
    status.map_or_else(String::new, |status| {
        let class = if status.is_error() { "error" } else { "success" };
        format!(
            "<p class=\"{class}\" role=\"status\">{}</p>\n",
            escape(&status.text)
        )
    })
}

pub fn login(status: Option<&StatusMessage>, email: &str) -> Html<String> {
    let body = format!(
        "<h1>Login</h1>\n\
         <form method=\"post\" action=\"{login}\" onsubmit=\"{DISABLE_ON_SUBMIT}\">\n\
         <label for=\"email\">Email</label>\n\
         <input id=\"email\" name=\"email\" type=\"email\" value=\"{email}\" placeholder=\"you@example.com\">\n\
         <label for=\"password\">Password</label>\n\
         <input id=\"password\" name=\"password\" type=\"password\" placeholder=\"********\">\n\
         <button name=\"action\" value=\"sign_in\">Sign in</button>\n\
         <button name=\"action\" value=\"sign_up\">Sign up</button>\n\
         <button name=\"action\" value=\"reset\">Forgot password</button>\n\
         </form>\n{status}",
        login = Route::Login.path(),
        email = escape(email),
        status = status_line(status),
    );
    layout("Login", "", &body)
}

/// `refresh` renders the pending navigation as a meta refresh.
pub fn reset_password(
    status: Option<&StatusMessage>,
    refresh: Option<(Route, Duration)>,
) -> Html<String> {
    let head = refresh.map_or_else(String::new, |(route, delay)| {
        format!(
            "<meta http-equiv=\"refresh\" content=\"{:.1};url={}\">\n",
            delay.as_secs_f64(),
            route.path()
        )
    });
    let body = format!(
        "<h1>Reset password</h1>\n\
         <form method=\"post\" action=\"{action}\" onsubmit=\"{DISABLE_ON_SUBMIT}\">\n\
         <label for=\"new_password\">New password</label>\n\
         <input id=\"new_password\" name=\"new_password\" type=\"password\">\n\
         <button>Update password</button>\n\
         </form>\n{status}",
        action = Route::ResetPassword.path(),
        status = status_line(status),
    );
    layout("Reset password", &head, &body)
}

/// Hands the full landing URL, fragment included, back to the server.
pub fn callback_landing() -> Html<String> {
    let action = Route::AuthCallback.path();
    let body = format!(
        "<p>Completing sign-in...</p>\n\
         <form id=\"landing\" method=\"post\" action=\"{action}\">\n\
         <input type=\"hidden\" name=\"landing\">\n\
         <noscript><button>Continue</button></noscript>\n\
         </form>\n\
         <script>\n\
         const form = document.getElementById(\"landing\");\n\
         form.landing.value = window.location.href;\n\
         form.submit();\n\
         </script>\n"
    );
    layout("Signing in", "", &body)
}

pub fn callback_failure(failure: &CallbackFailure) -> Html<String> {
    let mut body = String::from("<h1>Authentication failed</h1>\n");
    if failure.no_evidence() {
        body.push_str("<p>The link is missing its sign-in details.</p>\n");
    } else {
        body.push_str("<ul class=\"error\">\n");
        for attempt in &failure.attempts {
            body.push_str(&format!(
                "<li>{}: {}</li>\n",
                escape(&attempt.evidence.to_string()),
                escape(&attempt.error.to_string())
            ));
        }
        body.push_str("</ul>\n");
    }
    body.push_str(&format!(
        "<p><a href=\"{}\">Back to login</a></p>\n",
        Route::Login.path()
    ));
    layout("Authentication failed", "", &body)
}

pub fn projects(identity: &Identity, projects: &[Project], error: Option<&str>) -> Html<String> {
    let mut body = format!(
        "<h1>Projects</h1>\n\
         <form method=\"post\" action=\"/logout\"><button>Log out</button></form>\n\
         <p>Welcome, {}</p>\n",
        escape(&identity.email)
    );
    if let Some(error) = error {
        body.push_str(&format!(
            "<p class=\"error\" role=\"alert\">{}</p>\n",
            escape(error)
        ));
    }
    body.push_str(&format!(
        "<form method=\"post\" action=\"{}\" onsubmit=\"{DISABLE_ON_SUBMIT}\">\n\
         <input name=\"name\" placeholder=\"Project name\">\n\
         <button>Add</button>\n</form>\n",
        Route::Projects.path()
    ));

    if projects.is_empty() {
        body.push_str("<p>No projects yet</p>\n");
    }
    for project in projects {
        body.push_str(&format!(
            "<div class=\"project\">\n<div><h3>{name}</h3><small>{created}</small></div>\n\
             <form method=\"post\" action=\"{base}/{id}/delete\" onsubmit=\"{DISABLE_ON_SUBMIT}\">\
             <button>Delete</button></form>\n</div>\n",
            name = escape(&project.name),
            created = project.created_at.format("%Y-%m-%d"),
            base = Route::Projects.path(),
            id = escape(&project.id),
        ));
    }
    layout("Projects", "", &body)
}
