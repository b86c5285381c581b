//! HTML body rewriting.
//!
//! Two passes over the decoded text:
//! 1. domain substitution through the [`RewriteRuleset`]
//! 2. hover-script injection before the first `</body>`
//!
//! Both passes are total. A document without `</body>` only gets the
//! substitution pass.

use crate::rewrite::rules::RewriteRuleset;

const BODY_CLOSE: &str = "</body>";

/// Opening tag of the injected script; its presence marks a rewritten document.
pub const HOVER_SCRIPT_MARKER: &str = "<script data-mirror-hover>";

/// Highlights every link on hover once the document has loaded.
pub const HOVER_SCRIPT: &str = r#"<script data-mirror-hover>
document.addEventListener('DOMContentLoaded', function () {
  document.querySelectorAll('a').forEach(function (link) {
    link.style.transition = 'all 0.3s ease';
    link.addEventListener('mouseenter', function () {
      link.style.backgroundColor = '#ffeb3b';
      link.style.textDecoration = 'none';
      link.style.borderRadius = '3px';
      link.style.border = '1px solid orange';
      link.style.padding = '0 4px';
    });
    link.addEventListener('mouseleave', function () {
      link.style.backgroundColor = 'transparent';
      link.style.padding = '0';
      link.style.border = '';
    });
  });
});
</script>
"#;

/// Rewrites HTML text for the mirror domain.
#[derive(Debug, Clone)]
pub struct BodyRewriter {
    ruleset: RewriteRuleset,
    inject_script: bool,
}

impl BodyRewriter {
    pub fn new(ruleset: RewriteRuleset, inject_script: bool) -> Self {
        Self {
            ruleset,
            inject_script,
        }
    }

    pub fn ruleset(&self) -> &RewriteRuleset {
        &self.ruleset
    }

    /// Rewrite a document. Never fails; `rewrite(rewrite(x)) == rewrite(x)`.
    pub fn rewrite(&self, html: &str) -> String {
        let substituted = self.ruleset.apply(html);
        if self.inject_script {
            inject_hover_script(&substituted)
        } else {
            substituted
        }
    }
}

/// Insert [`HOVER_SCRIPT`] right before the first `</body>`.
///
/// Returns the input unchanged when there is no closing body tag or the
/// script already sits in front of it.
pub fn inject_hover_script(html: &str) -> String {
    match html.find(BODY_CLOSE) {
        Some(idx) if html[..idx].contains(HOVER_SCRIPT_MARKER) => html.to_string(),
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + HOVER_SCRIPT.len());
            out.push_str(&html[..idx]);
            out.push_str(HOVER_SCRIPT);
            out.push_str(&html[idx..]);
            out
        }
        None => html.to_string(),
    }
}
