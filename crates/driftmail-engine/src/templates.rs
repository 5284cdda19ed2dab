//! Email templates — pre-rendered HTML bodies for the three lifecycle
//! messages. Each function returns `(subject, html)`.

/// Link placed under every call-to-action button.
const SITE_URL: &str = "https://app.driftmail.io";

/// Welcome email, sent exactly once per signup.
pub fn welcome(full_name: &str) -> (String, String) {
    let subject = "Welcome to the platform".to_string();
    let html = format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; margin: 0; padding: 0; background-color: #f4f4f4;">
    <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff; border-radius: 8px; overflow: hidden;">
      <div style="background-color: #4CAF50; color: #ffffff; text-align: center; padding: 20px 0; font-size: 24px; font-weight: bold;">
        Welcome to the Platform!
      </div>
      <div style="padding: 30px; text-align: center; color: #333333; font-size: 16px;">
        <h2 style="color: #4CAF50;">Hi {full_name},</h2>
        <p>Welcome to our platform! We're excited to have you on board.</p>
        <a href="{SITE_URL}" style="background-color: #4CAF50; color: #ffffff; padding: 10px 20px; border-radius: 5px; text-decoration: none; font-weight: bold; display: inline-block;">Get Started</a>
      </div>
      <div style="background-color: #f4f4f4; text-align: center; padding: 15px; font-size: 12px; color: #888888;">
        <p>If you have any questions, feel free to contact us.</p>
      </div>
    </div>
  </body>
</html>"#
    );
    (subject, html)
}

/// Re-engagement email for users classified `non-active`.
pub fn re_engagement(full_name: &str) -> (String, String) {
    let subject = "Are you still there?".to_string();
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; background-color: #f9fafb; padding: 30px;">
  <div style="max-width: 600px; margin: auto; background: white; border-radius: 8px; overflow: hidden;">
    <div style="background-color: #2563eb; color: white; padding: 20px 30px;">
      <h1 style="margin: 0; font-size: 24px;">We Miss You, {full_name}!</h1>
    </div>
    <div style="padding: 30px;">
      <p style="font-size: 16px; color: #333;">
        It's been a while since we last saw you, and we just wanted to check in.
      </p>
      <p style="font-size: 16px; color: #333;">
        There's a lot waiting for you on our platform — new features, updates, and a community that's eager to have you back!
      </p>
      <div style="text-align: center; margin: 30px 0;">
        <a href="{SITE_URL}" style="background-color: #2563eb; color: white; text-decoration: none; padding: 12px 24px; border-radius: 6px; font-weight: bold;">Come Back Now</a>
      </div>
      <p style="font-size: 14px; color: #6b7280;">
        If you have any questions or need help, feel free to reply to this email.
      </p>
    </div>
  </div>
</div>"#
    );
    (subject, html)
}

/// Welcome-back email for users classified `active`.
pub fn welcome_back(full_name: &str) -> (String, String) {
    let subject = "Welcome back to the platform".to_string();
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; background-color: #f3f4f6; padding: 30px;">
  <div style="max-width: 600px; margin: auto; background: white; border-radius: 10px; overflow: hidden;">
    <div style="background-color: #10b981; color: white; padding: 20px 30px;">
      <h1 style="margin: 0; font-size: 24px;">Welcome Back, {full_name}!</h1>
    </div>
    <div style="padding: 30px;">
      <p style="font-size: 16px; color: #111827;">
        We're thrilled to see you again. You've been missed!
      </p>
      <p style="font-size: 16px; color: #374151;">
        We've been working hard to improve your experience. New features, smarter tools, and more community fun are waiting for you.
      </p>
      <div style="text-align: center; margin: 30px 0;">
        <a href="{SITE_URL}" style="background-color: #10b981; color: white; text-decoration: none; padding: 12px 24px; border-radius: 6px; font-weight: bold;">Explore What's New</a>
      </div>
      <p style="font-size: 14px; color: #6b7280;">
        Need help? Just reply to this email — we're always here for you.
      </p>
    </div>
  </div>
</div>"#
    );
    (subject, html)
}
