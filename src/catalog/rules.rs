//! Built-in rule table and the engine that interprets it.
//!
//! Rules are plain data. [`RuleTransform`] pairs a rule with a fresh
//! [`ScopeTracker`] and turns it into a [`LineTransform`] for the rewriter.
//! Every action is gated on `marker_detected`, which is what makes a second
//! pass over already-patched output a no-op.

use crate::catalog::version::Applicability;
use crate::rewrite::LineTransform;
use crate::scope::{LineEvent, LineMatcher, MarkerPolicy, ScopeExit, ScopeSpec, ScopeTracker};

/// Default edit marker. Matches the token earlier tooling wrote, so output
/// patched by either is recognised.
pub const DEFAULT_MARKER: &str = "https://github.com/jiulongw/swift-unity#v1";

/// What a rule does to the lines it selects.
///
/// Templates may contain `{marker}` and `{line}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Replace `from` with `to` on every line matching `anchor`
    ReplaceText {
        anchor: LineMatcher,
        from: &'static str,
        to: &'static str,
    },
    /// Comment out every scope line (after a one-time `header`), then emit
    /// `closing` in place of the line that ends the scope
    CommentOutScope {
        header: &'static [&'static str],
        line: &'static str,
        closing: &'static [&'static str],
    },
    /// Insert `lines` right before the line that ends the scope
    InsertBeforeScopeEnd { lines: &'static [&'static str] },
    /// Insert `lines` right before the first line matching `anchor`
    InsertBefore {
        anchor: LineMatcher,
        lines: &'static [&'static str],
    },
    /// Emit `header` before the first scope line and swap lines matching
    /// `anchor` inside the scope body for `replacement`
    OverrideInScope {
        header: &'static [&'static str],
        anchor: LineMatcher,
        replacement: &'static [&'static str],
    },
}

/// A named patch against one generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRule {
    pub id: &'static str,
    /// Path relative to the build-output root, `/`-separated
    pub target: &'static str,
    pub description: &'static str,
    pub applicability: Applicability,
    pub scope: Option<ScopeSpec>,
    pub marker_policy: MarkerPolicy,
    pub action: RuleAction,
}

impl PatchRule {
    /// Build a line transform with fresh scope state.
    pub fn transform(&self, marker: &str) -> RuleTransform<'_> {
        RuleTransform {
            rule: self,
            tracker: ScopeTracker::new(self.scope, self.marker_policy, marker),
        }
    }
}

pub struct RuleTransform<'a> {
    rule: &'a PatchRule,
    tracker: ScopeTracker,
}

impl RuleTransform<'_> {
    fn render(&self, templates: &[&str], line: &str) -> Vec<String> {
        templates
            .iter()
            .map(|t| render_template(t, self.tracker.marker(), line))
            .collect()
    }

    fn selected(&self, event: &LineEvent) -> bool {
        self.rule.scope.is_none() || event.in_scope
    }
}

impl LineTransform for RuleTransform<'_> {
    fn transform(&mut self, line: &str) -> Vec<String> {
        let event = self.tracker.observe(line);
        if self.tracker.state().marker_detected {
            return vec![line.to_string()];
        }

        match self.rule.action {
            RuleAction::ReplaceText { anchor, from, to } => {
                if self.selected(&event) && anchor.matches(line) {
                    vec![line.replace(from, to)]
                } else {
                    vec![line.to_string()]
                }
            }
            RuleAction::CommentOutScope {
                header,
                line: commented,
                closing,
            } => {
                if !event.in_scope {
                    return vec![line.to_string()];
                }
                if event.exited {
                    return self.render(closing, line);
                }
                let mut out = Vec::new();
                if !self.tracker.state().marker_added {
                    self.tracker.mark_added();
                    out.extend(self.render(header, line));
                }
                out.push(render_template(commented, self.tracker.marker(), line));
                out
            }
            RuleAction::InsertBeforeScopeEnd { lines } => {
                if event.exited {
                    let mut out = self.render(lines, line);
                    out.push(line.to_string());
                    out
                } else {
                    vec![line.to_string()]
                }
            }
            RuleAction::InsertBefore { anchor, lines } => {
                if !self.tracker.state().marker_added && self.selected(&event) && anchor.matches(line) {
                    self.tracker.mark_added();
                    let mut out = self.render(lines, line);
                    out.push(line.to_string());
                    out
                } else {
                    vec![line.to_string()]
                }
            }
            RuleAction::OverrideInScope {
                header,
                anchor,
                replacement,
            } => {
                if !event.in_scope {
                    return vec![line.to_string()];
                }
                let mut out = Vec::new();
                if !self.tracker.state().marker_added {
                    self.tracker.mark_added();
                    out.extend(self.render(header, line));
                }
                if event.depth > 0 && anchor.matches(line) {
                    out.extend(self.render(replacement, line));
                } else {
                    out.push(line.to_string());
                }
                out
            }
        }
    }
}

fn render_template(template: &str, marker: &str, line: &str) -> String {
    template.replace("{marker}", marker).replace("{line}", line)
}

/// The built-in rules, one per generated file.
pub const BUILTIN_RULES: &[PatchRule] = &[
    PatchRule {
        id: "rename-main",
        target: "Classes/main.mm",
        description: "Rename the exported `main` so it does not clash with the host app's entry point",
        applicability: Applicability::Always,
        scope: None,
        marker_policy: MarkerPolicy::Anywhere,
        action: RuleAction::ReplaceText {
            anchor: LineMatcher::TrimmedStartsWith("int main("),
            from: "int main(",
            to: "int old_main(",
        },
    },
    PatchRule {
        id: "app-controller-accessor",
        target: "Classes/UnityAppController.h",
        description: "Resolve GetAppController() through the host delegate's currentUnityController",
        applicability: Applicability::Always,
        scope: Some(ScopeSpec {
            enter: LineMatcher::Contains("inline UnityAppController"),
            exit: ScopeExit::ClosingBrace,
        }),
        marker_policy: MarkerPolicy::Anywhere,
        action: RuleAction::CommentOutScope {
            header: &["// Modified by {marker}"],
            line: "// {line}",
            closing: &[
                "// }",
                "",
                "NS_INLINE UnityAppController* GetAppController()",
                "{",
                "    NSObject<UIApplicationDelegate>* delegate = [UIApplication sharedApplication].delegate;",
                "    UnityAppController* currentUnityController = (UnityAppController*)[delegate valueForKey: @\"currentUnityController\"];",
                "    return currentUnityController;",
                "}",
            ],
        },
    },
    PatchRule {
        id: "unity-ready-notification",
        target: "Classes/UnityAppController.mm",
        description: "Post a UnityReady notification once startUnity: has finished",
        applicability: Applicability::Always,
        scope: Some(ScopeSpec {
            enter: LineMatcher::Contains("- (void)startUnity:"),
            exit: ScopeExit::ClosingBrace,
        }),
        marker_policy: MarkerPolicy::InScope,
        action: RuleAction::InsertBeforeScopeEnd {
            lines: &[
                "    // Modified by {marker}",
                "    // Post a notification so that Swift can load unity view once started.",
                "    [[NSNotificationCenter defaultCenter] postNotificationName: @\"UnityReady\" object:self];",
            ],
        },
    },
    PatchRule {
        id: "metal-stencil-usage",
        target: "Classes/Unity/MetalHelper.mm",
        description: "Mark the stencil texture as a render target to avoid a Metal validation crash",
        applicability: Applicability::Exactly("2017.1.1f1"),
        scope: None,
        marker_policy: MarkerPolicy::Anywhere,
        action: RuleAction::InsertBefore {
            anchor: LineMatcher::TrimmedEquals(
                "surface->stencilRB = [surface->device newTextureWithDescriptor: stencilTexDesc];",
            ),
            lines: &[
                "",
                "    // Modified by {marker}",
                "    // Default stencilTexDesc.usage has flag 1. In runtime it will cause assertion failure:",
                "    // validateRenderPassDescriptor:589: failed assertion `Texture at stencilAttachment has usage (0x01) which doesn't specify MTLTextureUsageRenderTarget (0x04)'",
                "    // Adding MTLTextureUsageRenderTarget seems to fix this issue.",
                "    stencilTexDesc.usage |= MTLTextureUsageRenderTarget;",
            ],
        },
    },
    PatchRule {
        id: "splash-storyboard",
        target: "Classes/UI/SplashScreen.mm",
        description: "Disable the exported launch storyboard so the host app's launch screen is used",
        applicability: Applicability::AtLeast("2017.3.0"),
        scope: Some(ScopeSpec {
            enter: LineMatcher::TrimmedEquals("void ShowSplashScreen(UIWindow* window)"),
            exit: ScopeExit::BalancedBrace,
        }),
        marker_policy: MarkerPolicy::Anywhere,
        action: RuleAction::OverrideInScope {
            header: &["// Modified by {marker}"],
            anchor: LineMatcher::TrimmedStartsWith("bool hasStoryboard"),
            replacement: &["    // {line}", "    bool hasStoryboard = false;"],
        },
    },
];
