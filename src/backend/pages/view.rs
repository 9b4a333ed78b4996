/**
 * Page Templates
 *
 * Plain string templates for the demo pages. Post list items carry a `key`
 * attribute so the client's morph keeps their identity across pushes, and
 * the reply form opts out of morphing so a half-typed reply survives.
 */

use crate::backend::pages::db::{Post, Topic};
use std::fmt::Write;

/// Escape text for use in element content and quoted attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn layout(title: &str, main: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head>\
         <body>{}</body></html>",
        escape_html(title),
        main
    )
}

pub fn render_index(topics: &[Topic]) -> String {
    let mut main = String::from("<main id=\"index\"><h1>Topics</h1><ul id=\"topics\">");
    for topic in topics {
        let _ = write!(
            main,
            "<li key=\"topic-{id}\"><a href=\"/topics/{id}\">{title}</a></li>",
            id = topic.id,
            title = escape_html(&topic.title)
        );
    }
    main.push_str("</ul></main>");
    layout("Topics", &main)
}

pub fn render_topic(topic: &Topic, posts: &[Post]) -> String {
    let mut main = format!(
        "<main id=\"topic\"><h1>{}</h1><p class=\"count\">{} post(s)</p><ul id=\"posts\">",
        escape_html(&topic.title),
        posts.len()
    );
    for post in posts {
        let _ = write!(
            main,
            "<li key=\"post-{}\"><b>{}</b><p>{}</p></li>",
            post.id,
            escape_html(&post.author),
            escape_html(&post.body)
        );
    }
    let _ = write!(
        main,
        "</ul><form method=\"post\" action=\"/topics/{}/posts\" data-skip-morph>\
         <input name=\"author\"><textarea name=\"body\"></textarea>\
         <button type=\"submit\">Reply</button></form></main>",
        topic.id
    );
    layout(&topic.title, &main)
}
