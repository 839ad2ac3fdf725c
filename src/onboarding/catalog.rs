//! Message catalog: per-locale templates, yes/no vocabularies and gender
//! labels.
//!
//! Every locale is an exhaustive `match` over [`MessageKey`], so adding a key
//! without translating it is a compile error. A locale may return an empty
//! string for a key; lookup then falls back to the default locale so a raw
//! key never reaches the user.

use serde::{Deserialize, Serialize};

use super::model::{Field, Gender};

/// Supported conversation locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Fr,
    Es,
    De,
    Ru,
    Zh,
}

impl Locale {
    pub const ALL: [Locale; 6] = [
        Locale::En,
        Locale::Fr,
        Locale::Es,
        Locale::De,
        Locale::Ru,
        Locale::Zh,
    ];

    /// Resolve a locale tag by its primary subtag (`fr-CA` → `fr`).
    pub fn parse(tag: &str) -> Option<Locale> {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match primary.as_str() {
            "en" => Some(Self::En),
            "fr" => Some(Self::Fr),
            "es" => Some(Self::Es),
            "de" => Some(Self::De),
            "ru" => Some(Self::Ru),
            "zh" => Some(Self::Zh),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fr => "fr",
            Self::Es => "es",
            Self::De => "de",
            Self::Ru => "ru",
            Self::Zh => "zh",
        }
    }

    /// English name of the language, used in model instructions.
    pub fn language_name(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Fr => "French",
            Self::Es => "Spanish",
            Self::De => "German",
            Self::Ru => "Russian",
            Self::Zh => "Simplified Chinese",
        }
    }

    /// Separator used when joining keywords into a sentence.
    pub fn list_separator(&self) -> &'static str {
        match self {
            Self::Zh => "、",
            _ => ", ",
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Every user-facing string the onboarding flow can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Greeting,
    ConsentAsk,
    ConsentThanks,
    ConsentDeclined,
    ConsentReask,
    AskDisplayName,
    AskAge,
    AskGender,
    AskBio,
    NameLength,
    NameInvalid,
    NameTaken,
    AgeInvalid,
    AgeOutOfRange,
    GenderUnclear,
    GenderConfirm,
    BioTooLong,
    BioInvalid,
    BioModerated,
    Recap,
    ConfirmPrompt,
    FinalizeFailed,
    Welcome,
    ResumeGreeting,
    ChangeAck,
    MoodPrompt,
    MoodConfirm,
    MoodPublished,
    MoodInvalid,
    MoodSkipped,
    QuickFinish,
    QuickYes,
    QuickNo,
    GenderMale,
    GenderFemale,
    GenderOther,
    BioTemplate1,
    BioTemplate2,
    BioTemplate3,
    BioTemplate4,
    BioDefaultInterests,
}

impl MessageKey {
    pub const ALL: [MessageKey; 41] = [
        MessageKey::Greeting,
        MessageKey::ConsentAsk,
        MessageKey::ConsentThanks,
        MessageKey::ConsentDeclined,
        MessageKey::ConsentReask,
        MessageKey::AskDisplayName,
        MessageKey::AskAge,
        MessageKey::AskGender,
        MessageKey::AskBio,
        MessageKey::NameLength,
        MessageKey::NameInvalid,
        MessageKey::NameTaken,
        MessageKey::AgeInvalid,
        MessageKey::AgeOutOfRange,
        MessageKey::GenderUnclear,
        MessageKey::GenderConfirm,
        MessageKey::BioTooLong,
        MessageKey::BioInvalid,
        MessageKey::BioModerated,
        MessageKey::Recap,
        MessageKey::ConfirmPrompt,
        MessageKey::FinalizeFailed,
        MessageKey::Welcome,
        MessageKey::ResumeGreeting,
        MessageKey::ChangeAck,
        MessageKey::MoodPrompt,
        MessageKey::MoodConfirm,
        MessageKey::MoodPublished,
        MessageKey::MoodInvalid,
        MessageKey::MoodSkipped,
        MessageKey::QuickFinish,
        MessageKey::QuickYes,
        MessageKey::QuickNo,
        MessageKey::GenderMale,
        MessageKey::GenderFemale,
        MessageKey::GenderOther,
        MessageKey::BioTemplate1,
        MessageKey::BioTemplate2,
        MessageKey::BioTemplate3,
        MessageKey::BioTemplate4,
        MessageKey::BioDefaultInterests,
    ];

    pub const BIO_TEMPLATES: [MessageKey; 4] = [
        MessageKey::BioTemplate1,
        MessageKey::BioTemplate2,
        MessageKey::BioTemplate3,
        MessageKey::BioTemplate4,
    ];

    /// The question that asks for `field`.
    pub fn ask(field: Field) -> MessageKey {
        match field {
            Field::DisplayName => MessageKey::AskDisplayName,
            Field::Age => MessageKey::AskAge,
            Field::GenderId => MessageKey::AskGender,
            Field::Bio => MessageKey::AskBio,
        }
    }

    pub fn gender_label(gender: Gender) -> MessageKey {
        match gender {
            Gender::Male => MessageKey::GenderMale,
            Gender::Female => MessageKey::GenderFemale,
            Gender::Other => MessageKey::GenderOther,
        }
    }
}

/// Catalog lookups with a configured fallback locale.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog {
    default_locale: Locale,
}

impl Catalog {
    pub fn new(default_locale: Locale) -> Self {
        Self { default_locale }
    }

    pub fn default_locale(&self) -> Locale {
        self.default_locale
    }

    /// Raw template for `key`, falling back to the default locale and then
    /// to English when a translation is blank.
    pub fn text(&self, locale: Locale, key: MessageKey) -> &'static str {
        let s = table(locale, key);
        if !s.is_empty() {
            return s;
        }
        let fallback = table(self.default_locale, key);
        if !fallback.is_empty() {
            return fallback;
        }
        table(Locale::En, key)
    }

    /// Template for `key` with `{placeholder}` values substituted.
    pub fn render(&self, locale: Locale, key: MessageKey, vars: &[(&str, &str)]) -> String {
        let mut out = self.text(locale, key).to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }

    pub fn gender_label(&self, locale: Locale, gender: Gender) -> &'static str {
        self.text(locale, MessageKey::gender_label(gender))
    }

    /// The three gender chips in fixed order `[male, female, other]`.
    pub fn gender_chips(&self, locale: Locale) -> Vec<String> {
        Gender::ALL
            .iter()
            .map(|g| self.gender_label(locale, *g).to_string())
            .collect()
    }

    /// The single chip shown at the confirm stage.
    pub fn finish_chips(&self, locale: Locale) -> Vec<String> {
        vec![self.text(locale, MessageKey::QuickFinish).to_string()]
    }

    pub fn yes_no_chips(&self, locale: Locale) -> Vec<String> {
        vec![
            self.text(locale, MessageKey::QuickYes).to_string(),
            self.text(locale, MessageKey::QuickNo).to_string(),
        ]
    }

    /// Classify an utterance as yes (`Some(true)`), no (`Some(false)`) or
    /// neither. Vocabularies of every supported locale are accepted.
    pub fn yes_no(&self, text: &str) -> Option<bool> {
        let norm = normalize(text);
        if norm.is_empty() {
            return None;
        }
        // "no" is checked first so CJK prefixes like 不好 are not read as 好.
        if Locale::ALL.iter().any(|l| matches_vocab(&norm, no_words(*l))) {
            return Some(false);
        }
        if Locale::ALL.iter().any(|l| {
            matches_vocab(&norm, yes_words(*l))
                || norm == normalize(self.text(*l, MessageKey::QuickYes))
        }) {
            return Some(true);
        }
        None
    }

    /// Whether the utterance is an explicit finish/confirm/save intent.
    pub fn is_finish_intent(&self, locale: Locale, text: &str) -> bool {
        let norm = normalize(text);
        if norm.is_empty() {
            return false;
        }
        if Locale::ALL
            .iter()
            .any(|l| norm == normalize(self.text(*l, MessageKey::QuickFinish)))
        {
            return true;
        }
        matches_vocab(&norm, finish_words(locale)) || matches_vocab(&norm, finish_words(Locale::En))
    }

    pub fn is_skip_intent(&self, locale: Locale, text: &str) -> bool {
        let norm = normalize(text);
        matches_vocab(&norm, skip_words(locale)) || matches_vocab(&norm, skip_words(Locale::En))
    }

    /// Detect "change my <field>" in any supported locale.
    pub fn change_request(&self, text: &str) -> Option<Field> {
        let norm = normalize(text);
        let wants_change = Locale::ALL
            .iter()
            .flat_map(|l| change_words(*l).iter())
            .any(|w| norm.contains(w));
        if !wants_change {
            return None;
        }
        Field::ORDER.into_iter().find(|field| {
            Locale::ALL
                .iter()
                .flat_map(|l| field_words(*l, *field).iter())
                .any(|w| contains_word(&norm, w))
        })
    }
}

/// Lowercase, trim, and drop trailing punctuation and emoji.
pub fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .trim_end_matches(|c: char| {
            c.is_ascii_punctuation() || c.is_whitespace() || matches!(c, '。' | '！' | '？' | '…')
        })
        .trim()
        .to_string()
}

fn is_cjk_text(s: &str) -> bool {
    s.chars().any(|c| ('\u{4E00}'..='\u{9FFF}').contains(&c))
}

/// Whole-utterance or leading-word match. CJK entries match as prefixes
/// since the script has no spaces.
fn matches_vocab(norm: &str, words: &[&str]) -> bool {
    let first = norm
        .split(|c: char| c.is_whitespace() || c == ',' || c == '!' || c == '.')
        .next()
        .unwrap_or_default();
    words.iter().any(|w| {
        norm == *w || first == *w || (is_cjk_text(w) && norm.starts_with(w))
    })
}

fn contains_word(norm: &str, word: &str) -> bool {
    if is_cjk_text(word) {
        return norm.contains(word);
    }
    norm.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|tok| tok == word)
        || (word.contains(' ') && norm.contains(word))
}

fn yes_words(locale: Locale) -> &'static [&'static str] {
    match locale {
        Locale::En => &["yes", "y", "yeah", "yep", "yup", "sure", "ok", "okay", "of course", "i agree", "agree"],
        Locale::Fr => &["oui", "ouais", "d'accord", "bien sûr", "volontiers", "ok"],
        Locale::Es => &["sí", "si", "claro", "vale", "de acuerdo", "por supuesto"],
        Locale::De => &["ja", "klar", "einverstanden", "gerne", "okay", "jawohl"],
        Locale::Ru => &["да", "конечно", "ага", "хорошо", "согласен", "согласна"],
        Locale::Zh => &["是", "是的", "好", "好的", "可以", "同意", "行"],
    }
}

fn no_words(locale: Locale) -> &'static [&'static str] {
    match locale {
        Locale::En => &["no", "n", "nope", "nah", "not now", "no thanks"],
        Locale::Fr => &["non", "pas maintenant", "non merci"],
        Locale::Es => &["no", "ahora no", "no gracias"],
        Locale::De => &["nein", "nö", "nicht jetzt", "nein danke"],
        Locale::Ru => &["нет", "не сейчас", "нет спасибо"],
        Locale::Zh => &["不", "不要", "不是", "不行", "不同意"],
    }
}

fn finish_words(locale: Locale) -> &'static [&'static str] {
    match locale {
        Locale::En => &["finish", "done", "save", "confirm", "submit", "looks good", "that's it"],
        Locale::Fr => &["terminer", "valider", "enregistrer", "confirmer", "c'est bon", "fini"],
        Locale::Es => &["terminar", "guardar", "confirmar", "listo", "enviar"],
        Locale::De => &["fertig", "speichern", "bestätigen", "abschließen", "passt"],
        Locale::Ru => &["готово", "завершить", "сохранить", "подтвердить", "всё верно"],
        Locale::Zh => &["完成", "保存", "确认", "好了", "提交"],
    }
}

fn skip_words(locale: Locale) -> &'static [&'static str] {
    match locale {
        Locale::En => &["skip", "later", "maybe later", "no thanks"],
        Locale::Fr => &["passer", "plus tard", "non merci"],
        Locale::Es => &["saltar", "omitir", "luego", "más tarde"],
        Locale::De => &["überspringen", "später", "nein danke"],
        Locale::Ru => &["пропустить", "позже", "потом"],
        Locale::Zh => &["跳过", "以后", "稍后"],
    }
}

fn change_words(locale: Locale) -> &'static [&'static str] {
    match locale {
        Locale::En => &["change", "edit", "update", "modify", "fix"],
        Locale::Fr => &["changer", "modifier", "corriger"],
        Locale::Es => &["cambiar", "editar", "corregir"],
        Locale::De => &["ändern", "bearbeiten", "korrigieren"],
        Locale::Ru => &["изменить", "поменять", "исправить"],
        Locale::Zh => &["修改", "更改", "改"],
    }
}

fn field_words(locale: Locale, field: Field) -> &'static [&'static str] {
    match (locale, field) {
        (Locale::En, Field::DisplayName) => &["name", "username", "display name"],
        (Locale::En, Field::Age) => &["age"],
        (Locale::En, Field::GenderId) => &["gender"],
        (Locale::En, Field::Bio) => &["bio", "biography", "description"],
        (Locale::Fr, Field::DisplayName) => &["nom", "pseudo", "prénom"],
        (Locale::Fr, Field::Age) => &["âge", "age"],
        (Locale::Fr, Field::GenderId) => &["genre", "sexe"],
        (Locale::Fr, Field::Bio) => &["bio", "biographie", "description"],
        (Locale::Es, Field::DisplayName) => &["nombre", "apodo"],
        (Locale::Es, Field::Age) => &["edad"],
        (Locale::Es, Field::GenderId) => &["género", "genero", "sexo"],
        (Locale::Es, Field::Bio) => &["bio", "biografía", "descripción"],
        (Locale::De, Field::DisplayName) => &["name", "anzeigename"],
        (Locale::De, Field::Age) => &["alter"],
        (Locale::De, Field::GenderId) => &["geschlecht"],
        (Locale::De, Field::Bio) => &["bio", "biografie", "beschreibung"],
        (Locale::Ru, Field::DisplayName) => &["имя", "ник"],
        (Locale::Ru, Field::Age) => &["возраст"],
        (Locale::Ru, Field::GenderId) => &["пол"],
        (Locale::Ru, Field::Bio) => &["био", "о себе", "описание"],
        (Locale::Zh, Field::DisplayName) => &["名字", "昵称"],
        (Locale::Zh, Field::Age) => &["年龄"],
        (Locale::Zh, Field::GenderId) => &["性别"],
        (Locale::Zh, Field::Bio) => &["简介", "自我介绍"],
    }
}

fn table(locale: Locale, key: MessageKey) -> &'static str {
    match locale {
        Locale::En => en(key),
        Locale::Fr => fr(key),
        Locale::Es => es(key),
        Locale::De => de(key),
        Locale::Ru => ru(key),
        Locale::Zh => zh(key),
    }
}

fn en(key: MessageKey) -> &'static str {
    use MessageKey::*;
    match key {
        Greeting => "Hi! Let's set up your profile with a quick chat.",
        ConsentAsk => "Before we start, may I save your answers to create your profile?",
        ConsentThanks => "Thanks! Let's get started.",
        ConsentDeclined => "No problem. You can keep browsing as a guest, or come back any time to create your profile.",
        ConsentReask => "Just to be sure: can I save your answers? Please reply yes or no.",
        AskDisplayName => "What name should others see on your profile?",
        AskAge => "Nice to meet you, {name}! How old are you?",
        AskGender => "How do you identify?",
        AskBio => "Last step: give me a few things you love (like cats, coffee, hiking) and I'll write a short bio, or write one yourself.",
        NameLength => "That name is a little too short or too long. Could you try another one?",
        NameInvalid => "That doesn't look like a name. Please use letters.",
        NameTaken => "Sorry, \"{name}\" is already taken. Could you pick another name?",
        AgeInvalid => "Please tell me your age as a number.",
        AgeOutOfRange => "You need to be an adult to create a profile. Please enter your real age.",
        GenderUnclear => "Sorry, I didn't quite get that. Please pick one of the options below.",
        GenderConfirm => "Just checking, did you mean \"{gender}\"?",
        BioTooLong => "That's a bit long. Could you keep it to a short single line?",
        BioInvalid => "Tell me a bit about yourself in words, for example a few hobbies.",
        BioModerated => "Let's keep it friendly — try different keywords.",
        Recap => "Here's your profile:\nName: {name}\nAge: {age}\nGender: {gender}\nBio: {bio}",
        ConfirmPrompt => "Tap \"Finish profile\" to save it, or tell me what you'd like to change.",
        FinalizeFailed => "Sorry, we couldn't save your profile just now. Your answers are safe; tap \"Finish profile\" to try again.",
        Welcome => "Welcome aboard, {name}! Your profile is live.",
        ResumeGreeting => "Welcome back! Let's pick up where we left off.",
        ChangeAck => "Sure, let's update that.",
        MoodPrompt => "How are you feeling today? Share a short status for your feed, or say \"skip\".",
        MoodConfirm => "Post \"{text}\" to your feed?",
        MoodPublished => "Posted! Enjoy exploring.",
        MoodInvalid => "Keep it to one short line, please.",
        MoodSkipped => "No worries, maybe later.",
        QuickFinish => "Finish profile",
        QuickYes => "Yes",
        QuickNo => "No",
        GenderMale => "Male",
        GenderFemale => "Female",
        GenderOther => "Other",
        BioTemplate1 => "Hi, I'm {name}! Big fan of {keywords}. Always up for a good chat and a new adventure.",
        BioTemplate2 => "{name} here: {keywords} make my day. Say hi if you love them too!",
        BioTemplate3 => "Powered by {keywords} and a lot of curiosity. Let's swap stories!",
        BioTemplate4 => "I'm {name}, {age}, and my happy place involves {keywords}.",
        BioDefaultInterests => "good company and new experiences",
    }
}

fn fr(key: MessageKey) -> &'static str {
    use MessageKey::*;
    match key {
        Greeting => "Salut ! Créons ton profil en discutant un peu.",
        ConsentAsk => "Avant de commencer, puis-je enregistrer tes réponses pour créer ton profil ?",
        ConsentThanks => "Merci ! C'est parti.",
        ConsentDeclined => "Pas de souci. Tu peux continuer à visiter en invité, ou revenir quand tu veux pour créer ton profil.",
        ConsentReask => "Juste pour être sûr : puis-je enregistrer tes réponses ? Réponds oui ou non.",
        AskDisplayName => "Quel nom veux-tu afficher sur ton profil ?",
        AskAge => "Enchanté, {name} ! Quel âge as-tu ?",
        AskGender => "Comment t'identifies-tu ?",
        AskBio => "Dernière étape : donne-moi quelques choses que tu aimes (chats, café, rando…) et j'écris une petite bio, ou écris-la toi-même.",
        NameLength => "Ce nom est un peu trop court ou trop long. Tu peux en essayer un autre ?",
        NameInvalid => "Ça ne ressemble pas à un nom. Utilise des lettres, s'il te plaît.",
        NameTaken => "Désolé, « {name} » est déjà pris. Tu peux en choisir un autre ?",
        AgeInvalid => "Indique ton âge en chiffres, s'il te plaît.",
        AgeOutOfRange => "Il faut être majeur pour créer un profil. Indique ton âge réel.",
        GenderUnclear => "Désolé, je n'ai pas bien compris. Choisis une des options ci-dessous.",
        GenderConfirm => "Juste pour vérifier, tu voulais dire « {gender} » ?",
        BioTooLong => "C'est un peu long. Tu peux la raccourcir en une seule ligne ?",
        BioInvalid => "Parle-moi un peu de toi avec des mots, par exemple quelques loisirs.",
        BioModerated => "Restons sympas — essaie d'autres mots-clés.",
        Recap => "Voici ton profil :\nNom : {name}\nÂge : {age}\nGenre : {gender}\nBio : {bio}",
        ConfirmPrompt => "Appuie sur « Terminer le profil » pour l'enregistrer, ou dis-moi ce que tu veux changer.",
        FinalizeFailed => "Désolé, impossible d'enregistrer ton profil pour le moment. Tes réponses sont conservées ; appuie sur « Terminer le profil » pour réessayer.",
        Welcome => "Bienvenue, {name} ! Ton profil est en ligne.",
        ResumeGreeting => "Re-bonjour ! Reprenons où nous en étions.",
        ChangeAck => "D'accord, mettons ça à jour.",
        MoodPrompt => "Comment te sens-tu aujourd'hui ? Partage un petit statut, ou dis « passer ».",
        MoodConfirm => "Publier « {text} » sur ton fil ?",
        MoodPublished => "Publié ! Bonne exploration.",
        MoodInvalid => "Une seule ligne courte, s'il te plaît.",
        MoodSkipped => "Pas de souci, une autre fois.",
        QuickFinish => "Terminer le profil",
        QuickYes => "Oui",
        QuickNo => "Non",
        GenderMale => "Homme",
        GenderFemale => "Femme",
        GenderOther => "Autre",
        BioTemplate1 => "Salut, moi c'est {name} ! Fan de {keywords}. Toujours partant pour une bonne discussion.",
        BioTemplate2 => "{name} ici : {keywords}, c'est ce qui illumine mes journées. Dis bonjour si ça te parle !",
        BioTemplate3 => "Carburant : {keywords} et beaucoup de curiosité. On échange des histoires ?",
        BioTemplate4 => "Moi c'est {name}, {age} ans, et mon bonheur passe par {keywords}.",
        BioDefaultInterests => "les belles rencontres et les nouvelles expériences",
    }
}

fn es(key: MessageKey) -> &'static str {
    use MessageKey::*;
    match key {
        Greeting => "¡Hola! Vamos a crear tu perfil charlando un poco.",
        ConsentAsk => "Antes de empezar, ¿puedo guardar tus respuestas para crear tu perfil?",
        ConsentThanks => "¡Gracias! Empecemos.",
        ConsentDeclined => "Sin problema. Puedes seguir navegando como invitado o volver cuando quieras para crear tu perfil.",
        ConsentReask => "Solo para confirmar: ¿puedo guardar tus respuestas? Responde sí o no.",
        AskDisplayName => "¿Qué nombre quieres mostrar en tu perfil?",
        AskAge => "¡Encantado, {name}! ¿Cuántos años tienes?",
        AskGender => "¿Cómo te identificas?",
        AskBio => "Último paso: dime algunas cosas que te encantan (gatos, café, senderismo…) y escribo una bio corta, o escríbela tú.",
        NameLength => "Ese nombre es un poco corto o largo. ¿Puedes probar con otro?",
        NameInvalid => "Eso no parece un nombre. Usa letras, por favor.",
        NameTaken => "Lo siento, «{name}» ya está en uso. ¿Puedes elegir otro?",
        AgeInvalid => "Dime tu edad con números, por favor.",
        AgeOutOfRange => "Tienes que ser mayor de edad para crear un perfil. Indica tu edad real.",
        GenderUnclear => "Perdona, no lo entendí. Elige una de las opciones de abajo.",
        GenderConfirm => "Solo para comprobar, ¿querías decir «{gender}»?",
        BioTooLong => "Es un poco largo. ¿Puedes dejarlo en una sola línea corta?",
        BioInvalid => "Cuéntame algo sobre ti con palabras, por ejemplo algunas aficiones.",
        BioModerated => "Mantengámoslo amable — prueba con otras palabras clave.",
        Recap => "Este es tu perfil:\nNombre: {name}\nEdad: {age}\nGénero: {gender}\nBio: {bio}",
        ConfirmPrompt => "Pulsa «Terminar perfil» para guardarlo, o dime qué quieres cambiar.",
        FinalizeFailed => "Lo siento, no pudimos guardar tu perfil ahora. Tus respuestas están a salvo; pulsa «Terminar perfil» para reintentar.",
        Welcome => "¡Bienvenido, {name}! Tu perfil ya está activo.",
        ResumeGreeting => "¡Hola de nuevo! Sigamos donde lo dejamos.",
        ChangeAck => "Claro, vamos a actualizarlo.",
        MoodPrompt => "¿Cómo te sientes hoy? Comparte un estado corto o di «saltar».",
        MoodConfirm => "¿Publicar «{text}» en tu muro?",
        MoodPublished => "¡Publicado! Disfruta explorando.",
        MoodInvalid => "Una sola línea corta, por favor.",
        MoodSkipped => "Tranquilo, quizá más tarde.",
        QuickFinish => "Terminar perfil",
        QuickYes => "Sí",
        QuickNo => "No",
        GenderMale => "Hombre",
        GenderFemale => "Mujer",
        GenderOther => "Otro",
        BioTemplate1 => "¡Hola, soy {name}! Me encantan {keywords}. Siempre con ganas de una buena charla.",
        BioTemplate2 => "{name} por aquí: {keywords} me alegran el día. ¡Salúdame si a ti también!",
        BioTemplate3 => "Funciono a base de {keywords} y mucha curiosidad. ¿Compartimos historias?",
        BioTemplate4 => "Soy {name}, tengo {age} años y mi lugar feliz incluye {keywords}.",
        BioDefaultInterests => "la buena compañía y las experiencias nuevas",
    }
}

fn de(key: MessageKey) -> &'static str {
    use MessageKey::*;
    match key {
        Greeting => "Hallo! Lass uns dein Profil in einem kurzen Chat einrichten.",
        ConsentAsk => "Bevor wir starten: Darf ich deine Antworten speichern, um dein Profil zu erstellen?",
        ConsentThanks => "Danke! Los geht's.",
        ConsentDeclined => "Kein Problem. Du kannst als Gast weiterstöbern oder jederzeit zurückkommen, um dein Profil zu erstellen.",
        ConsentReask => "Nur zur Sicherheit: Darf ich deine Antworten speichern? Bitte antworte mit ja oder nein.",
        AskDisplayName => "Welcher Name soll auf deinem Profil stehen?",
        AskAge => "Freut mich, {name}! Wie alt bist du?",
        AskGender => "Wie identifizierst du dich?",
        AskBio => "Letzter Schritt: Nenn mir ein paar Dinge, die du magst (Katzen, Kaffee, Wandern …), und ich schreibe eine kurze Bio, oder schreib sie selbst.",
        NameLength => "Der Name ist etwas zu kurz oder zu lang. Magst du einen anderen probieren?",
        NameInvalid => "Das sieht nicht wie ein Name aus. Bitte verwende Buchstaben.",
        NameTaken => "Sorry, „{name}“ ist schon vergeben. Wähl bitte einen anderen Namen.",
        AgeInvalid => "Bitte gib dein Alter als Zahl an.",
        AgeOutOfRange => "Du musst volljährig sein, um ein Profil zu erstellen. Bitte gib dein echtes Alter an.",
        GenderUnclear => "Sorry, das habe ich nicht verstanden. Wähl bitte eine der Optionen unten.",
        GenderConfirm => "Nur zur Sicherheit: Meintest du „{gender}“?",
        BioTooLong => "Das ist etwas lang. Kannst du es auf eine kurze Zeile kürzen?",
        BioInvalid => "Erzähl mir etwas über dich in Worten, zum Beispiel ein paar Hobbys.",
        BioModerated => "Bleiben wir freundlich — versuch andere Stichworte.",
        Recap => "Hier ist dein Profil:\nName: {name}\nAlter: {age}\nGeschlecht: {gender}\nBio: {bio}",
        ConfirmPrompt => "Tippe auf „Profil abschließen“, um es zu speichern, oder sag mir, was du ändern möchtest.",
        FinalizeFailed => "Sorry, dein Profil konnte gerade nicht gespeichert werden. Deine Antworten bleiben erhalten; tippe auf „Profil abschließen“, um es erneut zu versuchen.",
        Welcome => "Willkommen, {name}! Dein Profil ist online.",
        ResumeGreeting => "Willkommen zurück! Machen wir da weiter, wo wir aufgehört haben.",
        ChangeAck => "Klar, lass uns das ändern.",
        MoodPrompt => "Wie fühlst du dich heute? Teile einen kurzen Status oder sag „überspringen“.",
        MoodConfirm => "„{text}“ in deinem Feed posten?",
        MoodPublished => "Gepostet! Viel Spaß beim Entdecken.",
        MoodInvalid => "Bitte nur eine kurze Zeile.",
        MoodSkipped => "Kein Problem, vielleicht später.",
        QuickFinish => "Profil abschließen",
        QuickYes => "Ja",
        QuickNo => "Nein",
        GenderMale => "Männlich",
        GenderFemale => "Weiblich",
        GenderOther => "Divers",
        BioTemplate1 => "Hi, ich bin {name}! Ich mag {keywords} und bin immer für ein gutes Gespräch zu haben.",
        BioTemplate2 => "{name} hier: {keywords} machen meinen Tag. Sag hallo, wenn es dir genauso geht!",
        BioTemplate3 => "Angetrieben von {keywords} und viel Neugier. Lass uns Geschichten tauschen!",
        BioTemplate4 => "Ich bin {name}, {age}, und mein Glücksort hat mit {keywords} zu tun.",
        BioDefaultInterests => "gute Gesellschaft und neue Erfahrungen",
    }
}

fn ru(key: MessageKey) -> &'static str {
    use MessageKey::*;
    match key {
        Greeting => "Привет! Давай заполним твой профиль в коротком чате.",
        ConsentAsk => "Прежде чем начать: можно сохранить твои ответы, чтобы создать профиль?",
        ConsentThanks => "Спасибо! Начинаем.",
        ConsentDeclined => "Без проблем. Можешь продолжить как гость или вернуться в любое время, чтобы создать профиль.",
        ConsentReask => "Уточню: можно сохранить твои ответы? Ответь, пожалуйста, да или нет.",
        AskDisplayName => "Какое имя показывать в твоём профиле?",
        AskAge => "Приятно познакомиться, {name}! Сколько тебе лет?",
        AskGender => "Как ты себя идентифицируешь?",
        AskBio => "Последний шаг: назови несколько вещей, которые ты любишь (кошки, кофе, походы…), и я напишу короткое био, или напиши его сам.",
        NameLength => "Это имя слишком короткое или длинное. Попробуешь другое?",
        NameInvalid => "Это не похоже на имя. Используй, пожалуйста, буквы.",
        NameTaken => "Извини, имя «{name}» уже занято. Выбери другое, пожалуйста.",
        AgeInvalid => "Укажи, пожалуйста, возраст числом.",
        AgeOutOfRange => "Чтобы создать профиль, нужно быть совершеннолетним. Укажи свой настоящий возраст.",
        GenderUnclear => "Извини, не понял. Выбери, пожалуйста, один из вариантов ниже.",
        GenderConfirm => "Уточню: ты имел в виду «{gender}»?",
        BioTooLong => "Длинновато. Можешь сократить до одной короткой строки?",
        BioInvalid => "Расскажи немного о себе словами, например о своих хобби.",
        BioModerated => "Давай по-дружески — попробуй другие ключевые слова.",
        Recap => "Вот твой профиль:\nИмя: {name}\nВозраст: {age}\nПол: {gender}\nО себе: {bio}",
        ConfirmPrompt => "Нажми «Завершить профиль», чтобы сохранить, или скажи, что изменить.",
        FinalizeFailed => "Извини, сейчас не удалось сохранить профиль. Ответы сохранены; нажми «Завершить профиль», чтобы попробовать снова.",
        Welcome => "Добро пожаловать, {name}! Твой профиль готов.",
        ResumeGreeting => "С возвращением! Продолжим с того места, где остановились.",
        ChangeAck => "Конечно, давай обновим.",
        MoodPrompt => "Как настроение сегодня? Поделись коротким статусом или скажи «пропустить».",
        MoodConfirm => "Опубликовать «{text}» в ленте?",
        MoodPublished => "Опубликовано! Приятного знакомства.",
        MoodInvalid => "Одна короткая строка, пожалуйста.",
        MoodSkipped => "Ничего страшного, в другой раз.",
        QuickFinish => "Завершить профиль",
        QuickYes => "Да",
        QuickNo => "Нет",
        GenderMale => "Мужской",
        GenderFemale => "Женский",
        GenderOther => "Другое",
        BioTemplate1 => "Привет, я {name}! Обожаю {keywords}. Всегда за хорошую беседу и новые приключения.",
        BioTemplate2 => "{name} на связи: {keywords} делают мой день. Пиши, если тебе это тоже близко!",
        BioTemplate3 => "Мой заряд энергии: {keywords} и любопытство. Давай обменяемся историями!",
        BioTemplate4 => "Я {name}, мне {age}, и моё счастье связано с {keywords}.",
        BioDefaultInterests => "хорошая компания и новые впечатления",
    }
}

fn zh(key: MessageKey) -> &'static str {
    use MessageKey::*;
    match key {
        Greeting => "你好！我们来聊几句，完成你的个人资料。",
        ConsentAsk => "开始之前，我可以保存你的回答来创建资料吗？",
        ConsentThanks => "谢谢！我们开始吧。",
        ConsentDeclined => "没关系。你可以继续以访客身份浏览，随时回来创建资料。",
        ConsentReask => "确认一下：我可以保存你的回答吗？请回答是或不。",
        AskDisplayName => "你希望资料上显示什么名字？",
        AskAge => "很高兴认识你，{name}！你多大了？",
        AskGender => "你的性别认同是？",
        AskBio => "最后一步：告诉我几样你喜欢的东西（比如猫、咖啡、徒步），我来写一段简介，或者你自己写。",
        NameLength => "这个名字有点太短或太长了，换一个试试？",
        NameInvalid => "这看起来不像名字，请使用文字。",
        NameTaken => "抱歉，“{name}”已被使用，请换一个名字。",
        AgeInvalid => "请用数字告诉我你的年龄。",
        AgeOutOfRange => "需要成年才能创建资料，请输入你的真实年龄。",
        GenderUnclear => "抱歉，我没听明白。请从下面的选项中选择一个。",
        GenderConfirm => "确认一下，你是指“{gender}”吗？",
        BioTooLong => "有点长了，可以缩短成一行吗？",
        BioInvalid => "用文字介绍一下自己吧，比如几个爱好。",
        BioModerated => "我们保持友好吧——换几个关键词试试。",
        Recap => "这是你的资料：\n名字：{name}\n年龄：{age}\n性别：{gender}\n简介：{bio}",
        ConfirmPrompt => "点击“完成资料”保存，或者告诉我要修改什么。",
        FinalizeFailed => "抱歉，暂时无法保存你的资料。你的回答都还在，点击“完成资料”重试。",
        Welcome => "欢迎你，{name}！你的资料已上线。",
        ResumeGreeting => "欢迎回来！我们从上次的地方继续。",
        ChangeAck => "好的，我们来修改。",
        MoodPrompt => "今天心情怎么样？分享一句简短的动态，或者说“跳过”。",
        MoodConfirm => "要把“{text}”发布到动态吗？",
        MoodPublished => "已发布！尽情探索吧。",
        MoodInvalid => "请只写一行简短的内容。",
        MoodSkipped => "没关系，下次再说。",
        QuickFinish => "完成资料",
        QuickYes => "是",
        QuickNo => "不",
        GenderMale => "男",
        GenderFemale => "女",
        GenderOther => "其他",
        BioTemplate1 => "嗨，我是{name}！我喜欢{keywords}，随时欢迎来聊天。",
        BioTemplate2 => "我是{name}：{keywords}让我每天都很开心。如果你也喜欢，来打个招呼吧！",
        BioTemplate3 => "靠{keywords}和好奇心充电，一起分享故事吧！",
        BioTemplate4 => "我是{name}，{age}岁，我的快乐源泉是{keywords}。",
        BioDefaultInterests => "好朋友和新体验",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_locale_has_every_key() {
        for locale in Locale::ALL {
            for key in MessageKey::ALL {
                assert!(
                    !table(locale, key).is_empty(),
                    "{locale} is missing a translation for {key:?}"
                );
            }
        }
    }

    #[test]
    fn placeholders_match_english() {
        let placeholder = regex::Regex::new(r"\{[a-z]+\}").unwrap();
        for key in MessageKey::ALL {
            let mut expected: Vec<&str> =
                placeholder.find_iter(en(key)).map(|m| m.as_str()).collect();
            expected.sort();
            for locale in Locale::ALL {
                let mut got: Vec<&str> = placeholder
                    .find_iter(table(locale, key))
                    .map(|m| m.as_str())
                    .collect();
                got.sort();
                assert_eq!(got, expected, "{locale} placeholders differ for {key:?}");
            }
        }
    }

    #[test]
    fn render_substitutes_placeholders() {
        let catalog = Catalog::default();
        let text = catalog.render(Locale::Fr, MessageKey::AskAge, &[("name", "Zoé")]);
        assert_eq!(text, "Enchanté, Zoé ! Quel âge as-tu ?");
    }

    #[test]
    fn locale_parse_uses_primary_subtag() {
        assert_eq!(Locale::parse("fr-CA"), Some(Locale::Fr));
        assert_eq!(Locale::parse("zh_Hans"), Some(Locale::Zh));
        assert_eq!(Locale::parse("EN"), Some(Locale::En));
        assert_eq!(Locale::parse("pt-BR"), None);
    }

    #[test]
    fn gender_chips_fixed_order() {
        let catalog = Catalog::default();
        assert_eq!(catalog.gender_chips(Locale::En), vec!["Male", "Female", "Other"]);
        assert_eq!(catalog.gender_chips(Locale::Fr), vec!["Homme", "Femme", "Autre"]);
        assert_eq!(catalog.finish_chips(Locale::De), vec!["Profil abschließen"]);
    }

    #[test]
    fn yes_no_across_locales() {
        let catalog = Catalog::default();
        for yes in ["yes", "Oui", "sí", "Ja!", "да", "好的", "yes please", "Okay."] {
            assert_eq!(catalog.yes_no(yes), Some(true), "{yes}");
        }
        for no in ["no", "Non", "nein", "нет", "不要", "nope, sorry"] {
            assert_eq!(catalog.yes_no(no), Some(false), "{no}");
        }
        for neither in ["maybe", "what is this?", "", "Zoé"] {
            assert_eq!(catalog.yes_no(neither), None, "{neither}");
        }
    }

    #[test]
    fn finish_intent_accepts_chip_label_in_any_locale() {
        let catalog = Catalog::default();
        assert!(catalog.is_finish_intent(Locale::En, "Finish profile"));
        assert!(catalog.is_finish_intent(Locale::En, "Terminer le profil"));
        assert!(catalog.is_finish_intent(Locale::Fr, "valider"));
        assert!(catalog.is_finish_intent(Locale::Zh, "完成"));
        assert!(!catalog.is_finish_intent(Locale::En, "hmm not sure"));
    }

    #[test]
    fn change_request_detects_field() {
        let catalog = Catalog::default();
        assert_eq!(catalog.change_request("I want to change my age"), Some(Field::Age));
        assert_eq!(catalog.change_request("modifier mon nom"), Some(Field::DisplayName));
        assert_eq!(catalog.change_request("修改性别"), Some(Field::GenderId));
        assert_eq!(catalog.change_request("edit the bio please"), Some(Field::Bio));
        assert_eq!(catalog.change_request("my age is fine"), None);
    }

    #[test]
    fn blank_translation_falls_back_to_default_locale() {
        // Every table is complete, so exercise the fallback chain via the
        // English table directly: a non-empty string is returned as-is.
        let catalog = Catalog::new(Locale::Fr);
        assert_eq!(catalog.text(Locale::Fr, MessageKey::QuickYes), "Oui");
        assert_eq!(catalog.default_locale(), Locale::Fr);
    }
}
