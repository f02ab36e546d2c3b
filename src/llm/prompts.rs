//! Prompt template for unit test generation.

use crate::config::GenerationSettings;

/// Bundled method under test, used when no source file is configured.
pub const SAMPLE_METHOD: &str = r#"public static double Evaluate(string expressionText)
{
    // B1: null/empty/whitespace check
    if (string.IsNullOrWhiteSpace(expressionText))
        throw new ArgumentException("Expression cannot be null, empty, or whitespace.", nameof(expressionText));

    var tokens = expressionText.Split(new[] { ' ' }, StringSplitOptions.RemoveEmptyEntries);

    // B2: expect exactly 3 tokens
    if (tokens.Length != 3)
        throw new FormatException($"Expression must have exactly 3 tokens, but got {tokens.Length}.");

    // B3: parse left operand
    if (!double.TryParse(tokens[0], out var leftOperand))
        throw new FormatException($"Could not parse left operand: {tokens[0]}");

    var operatorToken = tokens[1];

    // B4: validate operator
    if (operatorToken != "+" && operatorToken != "-" && operatorToken != "*" && operatorToken != "/")
        throw new NotSupportedException($"Operator '{operatorToken}' is not supported.");

    // B5: parse right operand
    if (!double.TryParse(tokens[2], out var rightOperand))
        throw new FormatException($"Could not parse right operand: {tokens[2]}");

    // B6: division by zero check
    if (operatorToken == "/" && rightOperand == 0)
        throw new DivideByZeroException("Cannot divide by zero.");

    // Perform operation (B7-B10)
    return operatorToken switch
    {
        "+" => leftOperand + rightOperand,
        "-" => leftOperand - rightOperand,
        "*" => leftOperand * rightOperand,
        "/" => leftOperand / rightOperand,
        _ => throw new NotSupportedException()
    };
}"#;

/// Names the prompt needs besides the method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext<'a> {
    pub language: &'a str,
    pub test_class: &'a str,
    pub test_namespace: &'a str,
    pub target_class: &'a str,
}

impl<'a> From<&'a GenerationSettings> for PromptContext<'a> {
    fn from(settings: &'a GenerationSettings) -> Self {
        Self {
            language: &settings.language,
            test_class: &settings.test_class,
            test_namespace: &settings.test_namespace,
            target_class: &settings.target_class,
        }
    }
}

/// Highest `B<n>` branch label mentioned in a comment (`// B3: ...`,
/// `(B7-B10)`), or 0 when the method isn't annotated.
fn count_branch_markers(method: &str) -> usize {
    method
        .lines()
        .filter_map(|line| line.split_once("//").map(|(_, comment)| comment))
        .flat_map(|comment| comment.split(|c: char| !c.is_ascii_alphanumeric()))
        .filter_map(|word| word.strip_prefix('B')?.parse::<usize>().ok())
        .max()
        .unwrap_or(0)
}

pub fn build_test_prompt(method: &str, ctx: &PromptContext<'_>) -> String {
    let branches = count_branch_markers(method);
    let coverage_line = if branches > 0 {
        format!("2. Cover all {} branch points (B1-B{})", branches, branches)
    } else {
        "2. Cover every branch and error path".to_string()
    };

    format!(
        "You are an expert C# test engineer. Generate comprehensive xUnit tests for this C# method.\n\
\n\
Method to test:\n\
```{language}\n\
{method}\n\
```\n\
\n\
Requirements:\n\
1. Generate 8-10 xUnit test methods\n\
{coverage_line}\n\
3. Use [Fact] or [Theory] with [InlineData]\n\
4. Include proper using statements\n\
5. Class name: {test_class}\n\
6. Namespace: {test_namespace}\n\
7. Target class: {target_class} (static methods)\n\
\n\
Write compilable C# test code only. No explanations.",
        language = ctx.language,
        method = method.trim(),
        coverage_line = coverage_line,
        test_class = ctx.test_class,
        test_namespace = ctx.test_namespace,
        target_class = ctx.target_class,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(settings: &GenerationSettings) -> PromptContext<'_> {
        PromptContext::from(settings)
    }

    #[test]
    fn test_sample_method_has_ten_branches() {
        assert_eq!(count_branch_markers(SAMPLE_METHOD), 10);
    }

    #[test]
    fn test_prompt_embeds_method_and_names() {
        let settings = GenerationSettings::default();
        let prompt = build_test_prompt(SAMPLE_METHOD, &ctx(&settings));
        assert!(prompt.contains("```csharp\npublic static double Evaluate"));
        assert!(prompt.contains("Cover all 10 branch points (B1-B10)"));
        assert!(prompt.contains("Class name: ClaudeGeneratedTests"));
        assert!(prompt.contains("Namespace: DemoCalc.Tests"));
        assert!(prompt.contains("Target class: DemoCalc"));
    }

    #[test]
    fn test_prompt_without_markers() {
        let settings = GenerationSettings::default();
        let prompt = build_test_prompt("public static int Add(int a, int b) => a + b;", &ctx(&settings));
        assert!(prompt.contains("Cover every branch and error path"));
        assert!(prompt.contains("Add(int a, int b)"));
    }
}
