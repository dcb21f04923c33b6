//! Prompt templates for the four oracle queries.
//!
//! Each prompt fixes the reply format that [`crate::reply`] accepts. Wording
//! may change freely; the marked output lines may not.

use anomtree_core::record::Record;
use anomtree_core::tree::RootView;

/// A prompt template for LLM requests.
pub trait PromptTemplate {
    /// Generate the prompt text.
    fn generate(&self) -> String;

    /// Get the system prompt (if any).
    fn system_prompt(&self) -> Option<String> {
        None
    }
}

const NAMING_RULES: &str = "\
Category names describe how many sensors of one domain misbehave together, for example
SingleSensorDrift, PartialGroupDrift, MostSensorsDrift or UniformGroupDrift. Small wording
variants are fine. Never name a category after a single sensor (no Temp1, Volt2) and never
after speed or intensity (no Sudden, Gradual, Spike, Severe). Domain anchors such as
Temp-related, Volt-related or Cross-domain may be introduced when missing. Sensor and domain
names in the examples are illustrative only.";

fn pretty_view(view: &RootView) -> String {
    serde_json::to_string_pretty(view).unwrap_or_else(|_| "{}".to_string())
}

fn quoted_list(items: &[String]) -> String {
    serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string())
}

/// Turn a [`Record`] into a one-sentence template.
#[derive(Debug, Clone)]
pub struct TemplatePrompt {
    pub record: Record,
}

impl TemplatePrompt {
    pub fn new(record: Record) -> Self {
        Self { record }
    }
}

impl PromptTemplate for TemplatePrompt {
    fn system_prompt(&self) -> Option<String> {
        Some(
            "You describe sensor anomalies in one compact sentence. \
             Respond ONLY with a JSON object, no explanation."
                .to_string(),
        )
    }

    fn generate(&self) -> String {
        let record = serde_json::to_string_pretty(&self.record).unwrap_or_default();
        format!(
            r#"The record below describes one anomaly. "ranking" lists domain scores, highest first;
treat it as authoritative and do not recompute it.

Rules:
- Round numbers to two decimals and prefix them with "~".
- List the sensors of a mentioned domain by value, highest first. Include those at 0.50 or
  above, or the few strongest if none reach 0.50.
- If "cross_domain_close" is false, describe the top-ranked domain only.
- If it is true, say the two top domains are nearly tied, show S2/S1 as a percentage
  (round(ratio_2_over_1 * 100)) and list a few top sensors of each domain in braces.

Record:
{record}

Respond with exactly:
{{"template": "<one concise sentence>."}}

JSON:"#
        )
    }
}

/// Choose the best existing path for a template.
#[derive(Debug, Clone)]
pub struct RoutePrompt {
    pub view: RootView,
    pub template: String,
}

impl RoutePrompt {
    pub fn new(view: RootView, template: impl Into<String>) -> Self {
        Self {
            view,
            template: template.into(),
        }
    }
}

impl PromptTemplate for RoutePrompt {
    fn system_prompt(&self) -> Option<String> {
        Some("You file anomaly templates into an existing category tree.".to_string())
    }

    fn generate(&self) -> String {
        format!(
            r#"Pick the single best node in the tree below for the template.

Rules:
- Templates that compare two domains at similar strength, or say "cross domain", go to the
  cross-domain anchor. Otherwise pick the one domain the template is about.
- You may return any existing node at any depth, leaf or internal. Prefer the deepest node
  that fits. If no child of a node fits, return that node itself.
- If nothing in the tree fits, return exactly ONE new top-level category and nothing deeper.
- Finish with a Found line: YES when every segment of the route exists, NO otherwise.

{naming}

Example:
Tree: {{"Temp-related": {{"SingleSensorDrift": "<END>", "UniformGroupSpike": "<END>"}}}}
Template: "Only one Temp sensor slowly increases over time."
Explanation: One temperature sensor misbehaves; SingleSensorDrift fits and UniformGroupSpike does not.
Route: (Temp-related -> SingleSensorDrift)
Found: YES

Example:
Tree: {{"Temp-related": "<END>"}}
Template: "Volt1 and Volt2 jump together abruptly."
Explanation: No voltage anchor exists, so a new top-level category is needed.
Route: (Volt-related)
Found: NO

Tree:
{tree}

Template:
"{template}"

Respond in exactly this format:
Explanation: <reasoning>
Route: (<SEG1> -> <SEG2> -> ...)
Found: YES | NO"#,
            naming = NAMING_RULES,
            tree = pretty_view(&self.view),
            template = self.template,
        )
    }
}

/// Propose a new branch for a template that has no home yet.
#[derive(Debug, Clone)]
pub struct AdditionPrompt {
    pub view: RootView,
    pub template: String,
}

impl AdditionPrompt {
    pub fn new(view: RootView, template: impl Into<String>) -> Self {
        Self {
            view,
            template: template.into(),
        }
    }
}

impl PromptTemplate for AdditionPrompt {
    fn system_prompt(&self) -> Option<String> {
        Some("You extend an anomaly category tree one branch at a time.".to_string())
    }

    fn generate(&self) -> String {
        format!(
            r#"The template below has no matching path in the tree. Propose where a new branch belongs.

Rules:
- The new branch must fit the existing structure; reuse existing segments where they apply.
- Start the explanation with "Path not found:" when an anchor or subtype is missing, or with
  "Internal node:" when you reached an internal node whose children all disagree.

{naming}

Example:
Tree: {{"Temp-related": {{"UniformGroupSpike": "<END>", "SingleSensorDrift": "<END>"}}}}
Template: "Temp1 and Temp2 drift upward while Temp3 stays near baseline."
Addition: (Temp-related -> PartialGroupDrift -> <END>)
Explanation: Internal node: part of the group drifts, which neither child describes.

Tree:
{tree}

Template:
"{template}"

Respond in exactly this format:
Addition: (<SEG1> -> <SEG2> -> ... -> <END>)
Explanation: <short reason>"#,
            naming = NAMING_RULES,
            tree = pretty_view(&self.view),
            template = self.template,
        )
    }
}

/// Decide whether a leaf's templates and a newcomer belong apart.
#[derive(Debug, Clone)]
pub struct SplitPrompt {
    pub leaf: String,
    pub existing: Vec<String>,
    pub incoming: String,
}

impl SplitPrompt {
    pub fn new(leaf: impl Into<String>, existing: Vec<String>, incoming: impl Into<String>) -> Self {
        Self {
            leaf: leaf.into(),
            existing,
            incoming: incoming.into(),
        }
    }
}

impl PromptTemplate for SplitPrompt {
    fn system_prompt(&self) -> Option<String> {
        Some("You refine anomaly categories by splitting leaves when warranted.".to_string())
    }

    fn generate(&self) -> String {
        format!(
            r#"Two lists of templates sit under the same leaf. Decide whether they form two distinct
subcategories.

- To split, give exactly two different short CamelCase names, one per list.
- To keep them together, give the parent name for both lists.
- Explain what each list shows and why the difference does or does not matter. Do not use
  angle brackets in the explanation.

{naming}

Example:
Parent Category: UniformGroupSpike
List 1: ["All Temp1-Temp3 contributions rise together."]
List 2: ["Every Temp sensor jumps from ~0.1 to ~0.9 in one cycle."]
Explanation:
Both lists describe the whole temperature group moving at once; only the wording differs.
Determination:
List 1: <UniformGroupSpike>
List 2: <UniformGroupSpike>

Parent Category: {leaf}
List 1: {existing}
List 2: {incoming}

Respond in exactly this format:
Explanation:
<reasoning>
Determination:
List 1: <NAME_FOR_LIST_1>
List 2: <NAME_FOR_LIST_2>"#,
            naming = NAMING_RULES,
            leaf = self.leaf,
            existing = quoted_list(&self.existing),
            incoming = quoted_list(std::slice::from_ref(&self.incoming)),
        )
    }
}
