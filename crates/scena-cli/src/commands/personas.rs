use anyhow::Result;
use scena_core::persona::PersonaRepository;
use scena_infrastructure::DirPersonaRepository;

pub async fn run() -> Result<()> {
    let repo = DirPersonaRepository::new()?;
    for id in repo.list().await? {
        let persona = repo.get(&id).await?;
        println!("{id:<16} {} ({})", persona.name, persona.persona_type);
    }
    Ok(())
}
