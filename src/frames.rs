//! Frame HTML rendering.
//!
//! A frame is an HTML document whose meta tags describe an image, one or two
//! buttons, and the URL the client POSTs the signed action back to. The body
//! mirrors the same information for anyone opening the URL in a browser.

/// How a frame button behaves when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Default: POST the signed action back to the frame's post URL.
    Post,
    /// POST, then follow the 302 the server answers with.
    PostRedirect,
}

#[derive(Debug, Clone)]
struct FrameButton {
    label: String,
    action: ButtonAction,
}

/// Builder for a frame response document.
#[derive(Debug, Clone)]
pub struct FramePage {
    title: String,
    image_url: String,
    post_url: String,
    buttons: Vec<FrameButton>,
    input_text: Option<String>,
    heading: Option<String>,
    rows: Vec<(String, String)>,
}

impl FramePage {
    pub fn new(
        title: impl Into<String>,
        image_url: impl Into<String>,
        post_url: impl Into<String>,
    ) -> Self {
        FramePage {
            title: title.into(),
            image_url: image_url.into(),
            post_url: post_url.into(),
            buttons: Vec::new(),
            input_text: None,
            heading: None,
            rows: Vec::new(),
        }
    }

    pub fn button(mut self, label: impl Into<String>) -> Self {
        self.buttons.push(FrameButton {
            label: label.into(),
            action: ButtonAction::Post,
        });
        self
    }

    pub fn redirect_button(mut self, label: impl Into<String>) -> Self {
        self.buttons.push(FrameButton {
            label: label.into(),
            action: ButtonAction::PostRedirect,
        });
        self
    }

    pub fn input_text(mut self, placeholder: impl Into<String>) -> Self {
        self.input_text = Some(placeholder.into());
        self
    }

    pub fn heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn row(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.rows.push((key.into(), value.into()));
        self
    }

    /// Renders the document with the full frame meta-tag set.
    pub fn html(&self) -> String {
        let mut meta = String::new();
        meta.push_str(&format!(
            "    <meta property=\"og:title\" content=\"{}\" />\n",
            self.title
        ));
        meta.push_str(&format!(
            "    <meta property=\"og:image\" content=\"{}\" />\n",
            self.image_url
        ));
        meta.push_str("    <meta property=\"fc:frame\" content=\"vNext\" />\n");
        meta.push_str(&format!(
            "    <meta property=\"fc:frame:image\" content=\"{}\" />\n",
            self.image_url
        ));
        if let Some(placeholder) = &self.input_text {
            meta.push_str(&format!(
                "    <meta property=\"fc:frame:input:text\" content=\"{placeholder}\" />\n"
            ));
        }
        for (i, button) in self.buttons.iter().enumerate() {
            let index = i + 1;
            meta.push_str(&format!(
                "    <meta property=\"fc:frame:button:{index}\" content=\"{}\" />\n",
                button.label
            ));
            if button.action == ButtonAction::PostRedirect {
                meta.push_str(&format!(
                    "    <meta property=\"fc:frame:button:{index}:action\" content=\"post_redirect\" />\n"
                ));
            }
        }
        meta.push_str(&format!(
            "    <meta property=\"fc:frame:post_url\" content=\"{}\" />\n",
            self.post_url
        ));

        let mut body = format!("    <img src=\"{}\" width=\"800\" />\n", self.image_url);
        if let Some(heading) = &self.heading {
            body.push_str(&format!("    <h1>{heading}</h1>\n"));
        }
        if !self.rows.is_empty() {
            body.push_str("    <table>\n");
            for (key, value) in &self.rows {
                body.push_str(&format!(
                    "      <tr>\n        <td>{key}</td>\n        <td>{value}</td>\n      </tr>\n"
                ));
            }
            body.push_str("    </table>\n");
        }

        format!("<html>\n  <head>\n{meta}  </head>\n  <body>\n{body}  </body>\n</html>\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_the_required_meta_tags() {
        let html = FramePage::new(
            "Frame Wallet Transaction",
            "https://example.com/images/robot-check.png",
            "https://example.com/v1/abcd",
        )
        .button("Sign Transaction")
        .redirect_button("View My Frame Wallet")
        .row("Compressed Partial UserOp", "abcd")
        .html();

        assert!(html.contains(r#"<meta property="og:title" content="Frame Wallet Transaction" />"#));
        assert!(html.contains(r#"<meta property="fc:frame" content="vNext" />"#));
        assert!(html.contains(
            r#"<meta property="fc:frame:image" content="https://example.com/images/robot-check.png" />"#
        ));
        assert!(html.contains(r#"<meta property="fc:frame:button:1" content="Sign Transaction" />"#));
        assert!(html.contains(
            r#"<meta property="fc:frame:button:2" content="View My Frame Wallet" />"#
        ));
        assert!(html.contains(
            r#"<meta property="fc:frame:button:2:action" content="post_redirect" />"#
        ));
        assert!(
            html.contains(r#"<meta property="fc:frame:post_url" content="https://example.com/v1/abcd" />"#)
        );
        assert!(!html.contains("fc:frame:button:1:action"));
        assert!(html.contains("<td>Compressed Partial UserOp</td>"));
    }

    #[test]
    fn input_meta_is_only_rendered_when_requested() {
        let base = FramePage::new("t", "i", "p");
        assert!(!base.clone().html().contains("fc:frame:input:text"));
        assert!(
            base.input_text("Call data for your transaction")
                .html()
                .contains(
                    r#"<meta property="fc:frame:input:text" content="Call data for your transaction" />"#
                )
        );
    }
}
