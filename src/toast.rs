pub const DEFAULT_TITLE: &str = "Home Assistant";
pub const DEFAULT_LOGO: &str =
    "https://raw.githubusercontent.com/home-assistant/home-assistant-iOS/master/icons/release_1024.png";

/// Optional extras carried in a notification's `data` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct NotifyData {
    /// Activation argument handed to the app when the toast is clicked.
    pub launch: Option<String>,
    pub hero: Option<String>,
    pub logo: Option<String>,
}

pub fn build_toast(title: &str, message: &str, data: Option<&NotifyData>) -> String {
    let mut launch = String::new();
    let mut content = format!(
        "<text>{}</text><text>{}</text>",
        escape(title),
        escape(message)
    );
    let mut logo = DEFAULT_LOGO;

    if let Some(data) = data {
        if let Some(l) = data.launch.as_deref().filter(|l| !l.is_empty()) {
            launch = format!(" launch=\"{}\"", escape(l));
        }
        if let Some(hero) = data.hero.as_deref().filter(|h| !h.is_empty()) {
            content.push_str(&format!(
                "<image src=\"{}\" placement=\"hero\" />",
                escape(hero)
            ));
        }
        if let Some(l) = data.logo.as_deref() {
            logo = l;
        }
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <toast{}><visual><binding template=\"ToastGeneric\">{}\
         <image src=\"{}\" placement=\"appLogoOverride\" hint-crop=\"circle\" />\
         </binding></visual></toast>",
        launch,
        content,
        escape(logo)
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
