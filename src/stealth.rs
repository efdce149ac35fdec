//! Stealth script generation: produces the document-start JavaScript payload
//! that aligns a page's runtime with a [`SessionIdentity`] and erases the
//! properties automation runtimes leave behind.

use crate::identity::SessionIdentity;

pub struct StealthScriptProvider;

impl StealthScriptProvider {
    /// Build the full stealth payload for one session. Idempotent: safe to
    /// evaluate more than once on the same page.
    pub fn generate(identity: &SessionIdentity) -> String {
        let mut parts = Vec::new();
        parts.push(navigator_overrides(identity));
        parts.push(screen_overrides(identity));
        parts.push(canvas_noise(identity));
        parts.push(webgl_spoofing(identity));
        parts.push(plugin_mimetype_overrides());
        parts.push(webrtc_removal());
        parts.push(automation_marker_removal());
        parts.push(permissions_override());
        parts.push(to_string_masking());
        parts.join("\n")
    }
}

fn languages_js(identity: &SessionIdentity) -> String {
    let quoted: Vec<String> = identity.languages.iter().map(|l| format!("'{l}'")).collect();
    quoted.join(", ")
}

fn navigator_overrides(identity: &SessionIdentity) -> String {
    let client_hints = match &identity.client_hints {
        Some(hints) => format!(
            r#"
Object.defineProperty(navigator, 'userAgentData', {{
    get: () => ({{
        brands: [{brands}],
        mobile: {mobile},
        platform: '{platform}',
        getHighEntropyValues: () => Promise.resolve({{
            platform: '{platform}',
            platformVersion: '15.0.0',
            architecture: 'x86',
            bitness: '64',
            fullVersionList: [{brands}]
        }})
    }})
}});
"#,
            brands = hints
                .brands
                .split(", ")
                .map(|b| format!("{{brand: {}}}", b.split(";v=").next().unwrap_or(b)))
                .collect::<Vec<_>>()
                .join(", "),
            mobile = hints.mobile,
            platform = hints.platform,
        ),
        None => String::new(),
    };

    format!(
        r#"
// navigator property overrides
Object.defineProperty(navigator, 'userAgent', {{ get: () => '{user_agent}' }});
Object.defineProperty(navigator, 'platform', {{ get: () => '{platform}' }});
Object.defineProperty(navigator, 'language', {{ get: () => '{locale}' }});
Object.defineProperty(navigator, 'languages', {{ get: () => [{languages}] }});
Object.defineProperty(navigator, 'hardwareConcurrency', {{ get: () => {hardware_concurrency} }});
Object.defineProperty(navigator, 'deviceMemory', {{ get: () => {device_memory} }});
{client_hints}
"#,
        user_agent = identity.user_agent,
        platform = identity.platform,
        locale = identity.locale,
        languages = languages_js(identity),
        hardware_concurrency = identity.hardware_concurrency,
        device_memory = identity.device_memory_gb,
    )
}

fn screen_overrides(identity: &SessionIdentity) -> String {
    format!(
        r#"
// screen property overrides
Object.defineProperty(screen, 'width', {{ get: () => {width} }});
Object.defineProperty(screen, 'height', {{ get: () => {height} }});
Object.defineProperty(screen, 'availWidth', {{ get: () => {avail_width} }});
Object.defineProperty(screen, 'availHeight', {{ get: () => {avail_height} }});
Object.defineProperty(screen, 'colorDepth', {{ get: () => {color_depth} }});
Object.defineProperty(screen, 'pixelDepth', {{ get: () => {color_depth} }});
"#,
        width = identity.screen.width,
        height = identity.screen.height,
        avail_width = identity.screen.avail_width,
        avail_height = identity.screen.avail_height,
        color_depth = identity.screen.color_depth,
    )
}

/// Canvas readback noise keyed off the session's fingerprint seed so it is
/// stable within one session but differs across sessions (testable property 3).
fn canvas_noise(identity: &SessionIdentity) -> String {
    let seed = identity
        .fingerprint_seed
        .iter()
        .take(4)
        .fold(0u32, |acc, &b| acc.wrapping_mul(31).wrapping_add(b as u32));

    format!(
        r#"
// canvas fingerprint noise, seeded so repeated reads in this session agree
(function() {{
    let state = {seed};
    const noise = () => {{
        state = (state * 1103515245 + 12345) & 0x7fffffff;
        return (state % 3) - 1;
    }};
    const originalGetImageData = CanvasRenderingContext2D.prototype.getImageData;
    CanvasRenderingContext2D.prototype.getImageData = function() {{
        const imageData = originalGetImageData.apply(this, arguments);
        for (let i = 0; i < imageData.data.length; i += 4) {{
            imageData.data[i] = Math.min(255, Math.max(0, imageData.data[i] + noise()));
            imageData.data[i + 1] = Math.min(255, Math.max(0, imageData.data[i + 1] + noise()));
            imageData.data[i + 2] = Math.min(255, Math.max(0, imageData.data[i + 2] + noise()));
        }}
        return imageData;
    }};
    const originalToDataURL = HTMLCanvasElement.prototype.toDataURL;
    HTMLCanvasElement.prototype.toDataURL = function() {{
        const ctx = this.getContext('2d');
        if (ctx) {{
            const imageData = ctx.getImageData(0, 0, this.width, this.height);
            ctx.putImageData(imageData, 0, 0);
        }}
        return originalToDataURL.apply(this, arguments);
    }};
}})();
"#,
    )
}

fn webgl_spoofing(identity: &SessionIdentity) -> String {
    format!(
        r#"
// WebGL vendor/renderer spoofing
(function() {{
    const spoof = (proto) => {{
        const original = proto.getParameter;
        proto.getParameter = function(parameter) {{
            if (parameter === 37445) return '{vendor}';
            if (parameter === 37446) return '{renderer}';
            return original.apply(this, arguments);
        }};
    }};
    spoof(WebGLRenderingContext.prototype);
    if (typeof WebGL2RenderingContext !== 'undefined') {{
        spoof(WebGL2RenderingContext.prototype);
    }}
}})();
"#,
        vendor = identity.webgl.vendor,
        renderer = identity.webgl.renderer,
    )
}

fn plugin_mimetype_overrides() -> String {
    r#"
// plugin/mimetype presence
Object.defineProperty(navigator, 'plugins', {
    get: () => {
        const plugins = ['Chrome PDF Plugin', 'Chrome PDF Viewer', 'Native Client'];
        return plugins.map(name => ({ name, description: name, filename: name }));
    }
});
Object.defineProperty(navigator, 'mimeTypes', {
    get: () => [{ type: 'application/pdf', suffixes: 'pdf', description: '' }]
});
"#
    .to_string()
}

fn webrtc_removal() -> String {
    r#"
// WebRTC IP-leak surfaces removed
['RTCPeerConnection', 'webkitRTCPeerConnection', 'mozRTCPeerConnection'].forEach((name) => {
    if (name in window) {
        Object.defineProperty(window, name, { get: () => undefined });
    }
});
"#
    .to_string()
}

fn automation_marker_removal() -> String {
    r#"
// automation markers removed
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(window, 'chrome', { get: () => ({ runtime: {} }) });
(function() {
    const markerPrefixes = ['cdc_', '__playwright', '__webdriver_', '__selenium_', '__fxdriver_'];
    for (const key of Object.keys(window)) {
        if (markerPrefixes.some((p) => key.startsWith(p))) {
            try { delete window[key]; } catch (e) {}
        }
    }
    for (const key of Object.keys(document)) {
        if (markerPrefixes.some((p) => key.startsWith(p))) {
            try { delete document[key]; } catch (e) {}
        }
    }
})();
"#
    .to_string()
}

fn permissions_override() -> String {
    r#"
// permissions.query must resolve, not reject, for notifications
(function() {
    if (!navigator.permissions || !navigator.permissions.query) return;
    const originalQuery = navigator.permissions.query.bind(navigator.permissions);
    navigator.permissions.query = (parameters) => (
        parameters && parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission || 'default' })
            : originalQuery(parameters)
    );
})();
"#
    .to_string()
}

/// Overrides must not reveal themselves through `Function.prototype.toString`.
fn to_string_masking() -> String {
    r#"
// mask overrides from toString-based detection
(function() {
    const nativeToString = Function.prototype.toString;
    const patched = new WeakSet();
    const markPatched = (fn) => patched.add(fn);
    Function.prototype.toString = function() {
        if (patched.has(this)) {
            return `function ${this.name || ''}() { [native code] }`;
        }
        return nativeToString.call(this);
    };
    [CanvasRenderingContext2D.prototype.getImageData, HTMLCanvasElement.prototype.toDataURL,
     WebGLRenderingContext.prototype.getParameter].forEach((fn) => { if (fn) markPatched(fn); });
})();
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FingerprintSynthesiser;

    #[test]
    fn script_references_identity_fields() {
        let identity = FingerprintSynthesiser::generate(None, (1920, 1080));
        let script = StealthScriptProvider::generate(&identity);
        assert!(script.contains(&identity.user_agent));
        assert!(script.contains(&identity.webgl.vendor));
        assert!(script.contains("navigator.webdriver"));
        assert!(script.contains("cdc_"));
    }

    #[test]
    fn firefox_script_has_no_client_hints_block() {
        let identity = FingerprintSynthesiser::generate(
            Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0"),
            (1920, 1080),
        );
        let script = StealthScriptProvider::generate(&identity);
        assert!(!script.contains("userAgentData"));
    }
}
