// Reference data and quote systems shared by the integration tests
// WHY: Every scenario test resolves speakers against the same small character-verse table

/// Tab-delimited character-verse rows covering the verses the scenarios use
pub const CHARACTER_VERSE_DATA: &str = "\
# Book\tChapter\tVerse\tCharacter\tDelivery\tAlias\tQuoteType\tDefaultCharacter
MRK\t1\t3\tscripture\t\t\tQuotation
MRK\t1\t4\tJohn the Baptist\t\t\tQuotation
MRK\t1\t7-8\tJohn the Baptist\tpreaching\t\tNormal
MRK\t1\t11\tGod\t\t\tNormal
MRK\t1\t17\tJesus\t\t\tNormal
MRK\t1\t24\tman possessed by evil spirit\tshrieking\t\tNormal
MRK\t1\t25\tJesus\trebuking\t\tNormal
MRK\t1\t27\tpeople in synagogue\t\t\tNormal
MRK\t1\t27\tdisciples\t\t\tPotential
MRK\t1\t37\tPeter (Simon)/disciples\t\t\tNormal\tPeter (Simon)
MRK\t2\t14\tJesus\tcalling\t\tNormal
MRK\t2\t15\tJesus\t\t\tNormal
MRK\t2\t16\tscribes of the Pharisees\t\t\tNormal
MRK\t2\t16\tdisciples\t\t\tNormal
MRK\t2\t17\tscribes of the Pharisees\t\t\tNormal
MRK\t2\t17\tJesus\t\t\tNormal
MRK\t13\t14\tJesus\t\t\tNormal
MRK\t13\t14\tnarrator-MRK\t\t\tInterruption
JHN\t8\t11\tJesus\t\t\tNormal
JHN\t8\t11\twoman caught in adultery\t\t\tPotential
PSA\t2\t7-9\tGod\t\t\tImplicit
PSA\t2\t10-12\tpsalmist\t\t\tImplicit
";

/// Curly English quotes, three levels deep
pub const ENGLISH_QUOTE_SYSTEM: &str = r#"
[[levels]]
open = "“"
close = "”"
continue = "“"

[[levels]]
open = "‘"
close = "’"
continue = "“ ‘"

[[levels]]
open = "“"
close = "”"
continue = "“ ‘ “"
"#;

/// Single quotes outside, double quotes inside
pub const BRITISH_QUOTE_SYSTEM: &str = r#"
[[levels]]
open = "‘"
close = "’"
continue = "‘"

[[levels]]
open = "“"
close = "”"
continue = "‘ “"
"#;

/// Guillemets with a contextual em-dash for dialogue
pub const SPANISH_QUOTE_SYSTEM: &str = r#"
[[levels]]
open = "«"
close = "»"
continue = "«"

[[levels]]
open = "“"
close = "”"
continue = "« “"

[dialogue]
start = "—"
end = "—"
"#;

/// Curly quotes plus guillemets used as paired dialogue marks
pub const GUILLEMET_DIALOGUE_QUOTE_SYSTEM: &str = r#"
[[levels]]
open = "“"
close = "”"
continue = "“"

[dialogue]
start = "«"
end = "»"
"#;
